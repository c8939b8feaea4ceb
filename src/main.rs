use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::AccountService,
        clock::{Clock, SystemClock},
        comments::CommentService,
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        groups::{CreateGroupCommand, GroupError, GroupService},
        posts::PostService,
    },
    cache::{CacheConfig, CacheState, ResponseStore},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::UploadStorage,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Groups(args) => run_groups(settings, args.command).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let upload_storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone())
            .map_err(|err| InfraError::media(&settings.uploads.directory, err))?,
    );

    let feed = FeedService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
    );
    let posts = PostService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        upload_storage.clone(),
        clock.clone(),
    );
    let comments = CommentService::new(repositories.clone(), repositories.clone(), clock.clone());
    let follows = FollowService::new(repositories.clone(), repositories.clone());
    let accounts = AccountService::new(
        repositories.clone(),
        repositories.clone(),
        clock.clone(),
        settings.sessions.ttl,
    );

    let cache_config = CacheConfig::from(&settings.cache);
    let cache = cache_config.enabled.then(|| {
        let store = Arc::new(ResponseStore::new(&cache_config, clock.clone()));
        CacheState::new(cache_config.clone(), store)
    });

    let upload_body_limit = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::unexpected("upload request limit exceeds addressable memory"))?;

    let state = HttpState {
        feed: Arc::new(feed),
        posts: Arc::new(posts),
        comments: Arc::new(comments),
        follows: Arc::new(follows),
        accounts: Arc::new(accounts),
        health: repositories,
        upload_storage,
        cache,
        upload_body_limit,
    };

    serve_http(&settings, state).await
}

async fn run_groups(
    settings: config::Settings,
    command: config::GroupsCommand,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let service = GroupService::new(repositories.clone(), repositories);

    match command {
        config::GroupsCommand::Create {
            title,
            slug,
            description,
        } => {
            let group = service
                .create(CreateGroupCommand {
                    title,
                    slug,
                    description,
                })
                .await
                .map_err(group_error)?;
            println!("created group `{}` ({})", group.slug, group.title);
        }
        config::GroupsCommand::Describe { slug, description } => {
            let group = service
                .describe(&slug, &description)
                .await
                .map_err(group_error)?;
            println!("updated description of `{}`", group.slug);
        }
        config::GroupsCommand::Delete { slug } => {
            service.delete(&slug).await.map_err(group_error)?;
            println!("deleted group `{slug}`");
        }
        config::GroupsCommand::List => {
            let groups = service.list().await.map_err(group_error)?;
            if groups.is_empty() {
                println!("no groups");
            }
            for group in groups {
                println!("{}\t{}", group.slug, group.title);
            }
        }
    }

    Ok(())
}

fn group_error(err: GroupError) -> AppError {
    match err {
        GroupError::Repo(err) => AppError::from(InfraError::database(err.to_string())),
        other => AppError::validation(other.to_string()),
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "database url is not configured; set YATUBE__DATABASE__URL or pass --database-url",
        ))
    })?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::Io(err)))?;
    info!(addr = %settings.server.addr, "http listener started");

    let shutdown = Arc::new(Notify::new());
    let signal = {
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            info!("shutdown requested, draining connections");
            shutdown.notify_one();
        }
    };

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(signal)
        .into_future();
    let grace = settings.server.graceful_shutdown;

    tokio::select! {
        result = server => result.map_err(|err| AppError::from(InfraError::Io(err))),
        _ = drain_deadline(shutdown, grace) => {
            warn!(grace_secs = grace.as_secs(), "graceful shutdown timed out");
            Ok(())
        }
    }
}

async fn drain_deadline(shutdown: Arc<Notify>, grace: Duration) {
    shutdown.notified().await;
    tokio::time::sleep(grace).await;
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
