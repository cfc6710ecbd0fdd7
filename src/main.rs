use std::{process, sync::Arc};

use bacheca::{
    application::{
        auth::TokenAuthority, error::AppError, posts::PostService, repos::EntityRepo,
        users::UserService,
    },
    config,
    domain::entities::{PostRecord, UserRecord},
    infra::{
        cache::{CacheClient, RedisCache},
        db::{Database, schema},
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
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

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let db = init_database(&settings).await?;

    schema::verify::<UserRecord>().map_err(|err| AppError::unexpected(err.to_string()))?;
    schema::verify::<PostRecord>().map_err(|err| AppError::unexpected(err.to_string()))?;

    let cache = init_cache(&settings).await;

    let secret = settings
        .auth
        .secret
        .as_deref()
        .ok_or_else(|| InfraError::configuration("auth secret is not configured"))
        .map_err(AppError::from)?;
    let tokens = TokenAuthority::new(secret, settings.auth.token_ttl);

    let users: Arc<dyn EntityRepo<UserRecord>> = Arc::new(db.repo::<UserRecord>());
    let posts: Arc<dyn EntityRepo<PostRecord>> = Arc::new(db.repo::<PostRecord>());

    let state = ApiState {
        users: Arc::new(UserService::new(users, tokens.clone())),
        posts: Arc::new(PostService::new(
            posts,
            cache,
            settings.cache.post_list_ttl_seconds,
        )),
        tokens,
        db: db.clone(),
        max_post_bytes: settings.posts.max_post_bytes,
    };

    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(target = "bacheca::server", addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = require_database_url(&settings)?;

    let pool = Database::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Database::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    info!(target = "bacheca::migrate", "migrations applied");
    Ok(())
}

async fn init_database(settings: &config::Settings) -> Result<Database, AppError> {
    let database_url = require_database_url(settings)?;

    let pool = Database::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Database::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    Ok(Database::new(pool))
}

fn require_database_url(settings: &config::Settings) -> Result<&str, AppError> {
    settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| AppError::from(InfraError::configuration("database url is not configured")))
}

/// A missing or unreachable cache is never fatal; the service runs without
/// the read accelerator instead.
async fn init_cache(settings: &config::Settings) -> Option<Arc<dyn CacheClient>> {
    if !settings.cache.enabled {
        info!(
            target = "bacheca::cache",
            "post-list cache disabled by configuration"
        );
        return None;
    }

    let Some(url) = settings.cache.url.as_deref() else {
        info!(
            target = "bacheca::cache",
            "no cache url configured, serving without the post-list cache"
        );
        return None;
    };

    match RedisCache::connect(url, settings.cache.op_timeout).await {
        Ok(cache) => Some(Arc::new(cache) as Arc<dyn CacheClient>),
        Err(err) => {
            warn!(
                target = "bacheca::cache",
                error = %err,
                "cache connection failed, serving without the post-list cache"
            );
            None
        }
    }
}
