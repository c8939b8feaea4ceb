//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    CliArgs, Command, DatabaseOverride, GroupsArgs, GroupsCommand, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "yatube";
const ENV_PREFIX: &str = "YATUBE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_UPLOAD_DIR: &str = "media";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_CACHE_INDEX_TTL_SECS: u64 = 20;
const MAX_CACHE_INDEX_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_CACHE_RESPONSE_LIMIT: usize = 200;
const DEFAULT_SESSION_TTL_DAYS: u64 = 14;
const MAX_SESSION_TTL_DAYS: u64 = 3650;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub uploads: UploadSettings,
    pub cache: CacheSettings,
    pub sessions: SessionSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub index_ttl_secs: u64,
    pub response_limit: usize,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: time::Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Groups(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    uploads: RawUploadSettings,
    cache: RawCacheSettings,
    sessions: RawSessionSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        replace(&mut self.server.host, &overrides.server_host);
        replace(&mut self.server.port, &overrides.server_port);
        replace(
            &mut self.server.graceful_shutdown_seconds,
            &overrides.server_graceful_shutdown_seconds,
        );
        replace(&mut self.logging.level, &overrides.log_level);
        replace(&mut self.logging.json, &overrides.log_json);
        replace(
            &mut self.database.max_connections,
            &overrides.database_max_connections,
        );
        replace(&mut self.uploads.directory, &overrides.uploads_directory);
        replace(
            &mut self.uploads.max_request_bytes,
            &overrides.uploads_max_request_bytes,
        );
        replace(&mut self.cache.enabled, &overrides.cache_enabled);
        replace(
            &mut self.cache.index_ttl_secs,
            &overrides.cache_index_ttl_seconds,
        );
        replace(&mut self.sessions.ttl_days, &overrides.session_ttl_days);

        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        replace(&mut self.database.url, &overrides.database_url);
    }
}

fn replace<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            server: raw.server.resolve()?,
            logging: raw.logging.resolve()?,
            database: raw.database.resolve()?,
            uploads: raw.uploads.resolve()?,
            cache: raw.cache.resolve()?,
            sessions: raw.sessions.resolve()?,
        })
    }
}

impl RawServerSettings {
    fn resolve(self) -> Result<ServerSettings, LoadError> {
        let host = self.host.as_deref().unwrap_or(DEFAULT_HOST);
        let port = positive(
            self.port.map_or(u64::from(DEFAULT_PORT), u64::from),
            "server.port",
        )?;
        let candidate = format!("{host}:{port}");
        let addr = candidate.parse::<SocketAddr>().map_err(|err| {
            LoadError::invalid("server.addr", format!("`{candidate}` is not an address: {err}"))
        })?;

        let grace = positive(
            self.graceful_shutdown_seconds
                .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
            "server.graceful_shutdown_seconds",
        )?;

        Ok(ServerSettings {
            addr,
            graceful_shutdown: Duration::from_secs(grace),
        })
    }
}

impl RawLoggingSettings {
    fn resolve(self) -> Result<LoggingSettings, LoadError> {
        let level = self
            .level
            .as_deref()
            .map(LevelFilter::from_str)
            .transpose()
            .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?
            .unwrap_or(LevelFilter::INFO);

        let format = match self.json {
            Some(true) => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        Ok(LoggingSettings { level, format })
    }
}

impl RawDatabaseSettings {
    fn resolve(self) -> Result<DatabaseSettings, LoadError> {
        let url = self
            .url
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let max = positive(
            self.max_connections
                .map_or(u64::from(DEFAULT_DB_MAX_CONNECTIONS), u64::from),
            "database.max_connections",
        )?;
        let max_connections = u32::try_from(max)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| LoadError::invalid("database.max_connections", "out of range"))?;

        Ok(DatabaseSettings {
            url,
            max_connections,
        })
    }
}

impl RawUploadSettings {
    fn resolve(self) -> Result<UploadSettings, LoadError> {
        let directory = self
            .directory
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
        if directory.as_os_str().is_empty() {
            return Err(LoadError::invalid("uploads.directory", "path is empty"));
        }

        let limit = positive(
            self.max_request_bytes
                .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES),
            "uploads.max_request_bytes",
        )?;
        // The body limit layer takes a usize.
        if usize::try_from(limit).is_err() {
            return Err(LoadError::invalid(
                "uploads.max_request_bytes",
                "does not fit in usize",
            ));
        }

        Ok(UploadSettings {
            directory,
            max_request_bytes: NonZeroU64::new(limit).unwrap_or(NonZeroU64::MIN),
        })
    }
}

impl RawCacheSettings {
    fn resolve(self) -> Result<CacheSettings, LoadError> {
        let index_ttl_secs = self.index_ttl_secs.unwrap_or(DEFAULT_CACHE_INDEX_TTL_SECS);
        if index_ttl_secs == 0 {
            return Err(LoadError::invalid(
                "cache.index_ttl_secs",
                "must be greater than zero; set `cache.enabled = false` instead",
            ));
        }
        if index_ttl_secs > MAX_CACHE_INDEX_TTL_SECS {
            return Err(LoadError::invalid(
                "cache.index_ttl_secs",
                format!("must be at most {MAX_CACHE_INDEX_TTL_SECS}"),
            ));
        }

        Ok(CacheSettings {
            enabled: self.enabled.unwrap_or(true),
            index_ttl_secs,
            response_limit: self.response_limit.unwrap_or(DEFAULT_CACHE_RESPONSE_LIMIT),
        })
    }
}

impl RawSessionSettings {
    fn resolve(self) -> Result<SessionSettings, LoadError> {
        let days = positive(
            self.ttl_days.unwrap_or(DEFAULT_SESSION_TTL_DAYS),
            "sessions.ttl_days",
        )?;
        if days > MAX_SESSION_TTL_DAYS {
            return Err(LoadError::invalid(
                "sessions.ttl_days",
                format!("must be at most {MAX_SESSION_TTL_DAYS}"),
            ));
        }
        let days = i64::try_from(days)
            .map_err(|_| LoadError::invalid("sessions.ttl_days", "out of range"))?;

        Ok(SessionSettings {
            ttl: time::Duration::days(days),
        })
    }
}

fn positive(value: u64, key: &'static str) -> Result<u64, LoadError> {
    if value == 0 {
        Err(LoadError::invalid(key, "must be greater than zero"))
    } else {
        Ok(value)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    index_ttl_secs: Option<u64>,
    response_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    ttl_days: Option<u64>,
}

#[cfg(test)]
mod tests;
