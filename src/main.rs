use std::{future::IntoFuture, process, sync::Arc};

use tessera::{
    application::{
        cards::CardService,
        error::AppError,
        repos::{CardsRepo, CardsWriteRepo, SchemasRepo, SchemasWriteRepo},
        schemas::SchemaService,
    },
    cache::{CacheConfig, CacheState},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, PublicState, RouterState},
        telemetry,
    },
};
use tokio::{sync::watch, try_join};
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
    let (cli_args, settings) =
        config::load_with_cli().map_err(|err| AppError::from(InfraError::from(err)))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_router_state(repositories, &settings);
    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!(target: "tessera::migrate", "migrations applied");
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_router_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> RouterState {
    let schemas_repo: Arc<dyn SchemasRepo> = repositories.clone();
    let schemas_write_repo: Arc<dyn SchemasWriteRepo> = repositories.clone();
    let cards_repo: Arc<dyn CardsRepo> = repositories.clone();
    let cards_write_repo: Arc<dyn CardsWriteRepo> = repositories.clone();

    let schemas = Arc::new(SchemaService::new(schemas_repo.clone(), schemas_write_repo));
    let cards = Arc::new(CardService::new(
        schemas_repo,
        cards_repo,
        cards_write_repo,
        settings.cards.default_page_limit,
    ));

    let cache_config = CacheConfig::from(&settings.cache);
    info!(
        enabled = cache_config.enabled,
        shard_count = cache_config.shard_count,
        ttl_seconds = cache_config.ttl.as_secs(),
        max_bytes = cache_config.max_bytes,
        "response cache configured"
    );
    let cache = CacheState::new(cache_config);

    RouterState {
        public: PublicState {
            schemas: schemas.clone(),
            cards: cards.clone(),
            health: repositories,
            cache: cache.clone(),
        },
        api: ApiState {
            schemas,
            cards,
            cache,
        },
    }
}

async fn serve_http(settings: &config::Settings, state: RouterState) -> Result<(), AppError> {
    let public_router = http::build_router(state.clone());
    let admin_router = http::build_admin_router(state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        public_addr = %settings.server.public_addr,
        admin_addr = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()))
        .into_future();
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .into_future();

    let servers = async { try_join!(public_server, admin_server) };
    tokio::pin!(servers);

    let result = tokio::select! {
        result = &mut servers => result,
        () = shutdown_signal() => {
            info!("shutdown requested, draining connections");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(settings.server.graceful_shutdown, &mut servers).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        timeout_seconds = settings.server.graceful_shutdown.as_secs(),
                        "graceful shutdown timed out"
                    );
                    Ok(((), ()))
                }
            }
        }
    };

    result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
    Ok(())
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
