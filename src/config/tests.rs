use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_deployment_expectations() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.uploads.directory, PathBuf::from("media"));
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.index_ttl_secs, 20);
    assert_eq!(settings.sessions.ttl, time::Duration::days(14));
    assert!(settings.database.url.is_none());
}

#[test]
fn cache_can_be_disabled_via_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        cache_enabled: Some(false),
        cache_index_ttl_seconds: Some(5),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.cache.enabled);
    assert_eq!(settings.cache.index_ttl_secs, 5);
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.index_ttl_secs = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.index_ttl_secs",
            ..
        }
    ));
}

#[test]
fn blank_database_url_is_treated_as_missing() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["yatube"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_database_override() {
    let args = CliArgs::parse_from([
        "yatube",
        "serve",
        "--database-url",
        "postgres://example",
        "--server-port",
        "9000",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(
                serve.overrides.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(serve.overrides.server_port, Some(9000));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_groups_create_arguments() {
    let args = CliArgs::parse_from([
        "yatube",
        "groups",
        "--database-url",
        "postgres://example",
        "create",
        "--title",
        "Тестовая группа",
        "--description",
        "About cats",
    ]);

    match args.command.expect("groups command") {
        Command::Groups(groups) => {
            assert_eq!(
                groups.database.database_url.as_deref(),
                Some("postgres://example")
            );
            match groups.command {
                GroupsCommand::Create {
                    title,
                    slug,
                    description,
                } => {
                    assert_eq!(title, "Тестовая группа");
                    assert!(slug.is_none());
                    assert_eq!(description, "About cats");
                }
                other => panic!("wrong groups command: {other:?}"),
            }
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_groups_delete_arguments() {
    let args = CliArgs::parse_from(["yatube", "groups", "delete", "cats"]);
    match args.command.expect("groups command") {
        Command::Groups(groups) => {
            assert!(matches!(groups.command, GroupsCommand::Delete { ref slug } if slug == "cats"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn zero_values_name_the_offending_key() {
    let mut raw = RawSettings::default();
    raw.database.max_connections = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero pool");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "database.max_connections",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.sessions.ttl_days = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "sessions.ttl_days",
            ..
        }
    ));
}

#[test]
fn lifetimes_are_bounded() {
    let mut raw = RawSettings::default();
    raw.cache.index_ttl_secs = Some(u64::MAX);
    let err = Settings::from_raw(raw).expect_err("huge cache ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.index_ttl_secs",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.sessions.ttl_days = Some(u64::MAX);
    let err = Settings::from_raw(raw).expect_err("huge session ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "sessions.ttl_days",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.cache.index_ttl_secs = Some(MAX_CACHE_INDEX_TTL_SECS);
    raw.sessions.ttl_days = Some(MAX_SESSION_TTL_DAYS);
    let settings = Settings::from_raw(raw).expect("upper bounds are accepted");
    assert_eq!(settings.cache.index_ttl_secs, MAX_CACHE_INDEX_TTL_SECS);
}
