use std::{process, sync::Arc};

use foglio::{
    application::{
        accounts::AccountService,
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        pagination::Pager,
        posts::PostService,
    },
    cache::{CacheConfig, CacheState, PageStore, SystemClock},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::ImageStorage,
    },
};
use sqlx::PgPool;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

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
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn connect_pool(settings: &config::Settings) -> Result<PgPool, AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database.url is not set"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!("migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let repositories = Arc::new(PostgresRepositories::new(pool));

    let pager = Pager::new(settings.feed.page_size.get());
    let feed = Arc::new(FeedService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        pager,
    ));
    let posts = Arc::new(PostService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
    ));
    let follows = Arc::new(FollowService::new(
        repositories.clone(),
        repositories.clone(),
    ));
    let accounts = Arc::new(AccountService::new(
        repositories.clone(),
        repositories.clone(),
        settings.sessions.ttl,
    ));

    // Sweep sessions that expired while the server was down.
    match accounts.purge_expired_sessions().await {
        Ok(0) => {}
        Ok(purged) => info!(purged, "expired sessions removed"),
        Err(err) => warn!(error = %err, "expired session purge failed"),
    }

    let images = Arc::new(
        ImageStorage::new(settings.media.directory.clone()).map_err(InfraError::from)?,
    );

    let cache = if settings.cache.enabled {
        let cache_config = CacheConfig::from(&settings.cache);
        let store = Arc::new(PageStore::new(&cache_config, Arc::new(SystemClock)));
        Some(CacheState {
            config: cache_config,
            store,
        })
    } else {
        None
    };

    let state = HttpState {
        feed,
        posts,
        follows,
        accounts,
        images,
        health: repositories.clone(),
        cache,
        max_request_bytes: settings.media.max_request_bytes.get() as usize,
    };

    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let graceful = settings.server.graceful_shutdown;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
                Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
            };
        }
        () = shutdown_signal() => {
            let _ = shutdown_tx.send(());
        }
    }

    // Drain in-flight requests, but never hang shutdown past the
    // configured timeout.
    match tokio::time::timeout(graceful, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => {
            return Err(AppError::unexpected(format!("server error: {err}")));
        }
        Ok(Err(err)) => {
            return Err(AppError::unexpected(format!("server task failed: {err}")));
        }
        Err(_) => {
            warn!(
                timeout_secs = graceful.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install terminate handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("shutdown signal received");
}
