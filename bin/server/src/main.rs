use jobby_platform_access::{AccessTokenIssuer, ProviderRegistry};
use jobby_server::{
    auth::{self, AppState, OidcClient},
    bootstrap,
    cache::RedisUserCache,
    config::ServerConfig,
    db::{AwardRepository, ProfileRepository, UserRepository},
    notify::{NotificationDispatcher, NovuClient},
    router::build_router,
};
use sqlx::postgres::PgPoolOptions;
use std::{fmt, process::ExitCode, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A startup step that failed.
#[derive(Debug)]
struct StartupError {
    step: &'static str,
    details: String,
}

impl StartupError {
    fn new(step: &'static str, e: impl fmt::Display) -> Self {
        Self {
            step,
            details: e.to_string(),
        }
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.details)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(step = e.step, error = %e.details, "Server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| StartupError::new("configuration", e))?;
    tracing::info!("Loaded configuration");

    let providers = ProviderRegistry::standard();
    providers
        .validate(&config.auth0.providers())
        .map_err(|e| StartupError::new("identity providers", e))?;

    let tokens = AccessTokenIssuer::new(&config.secret_key)
        .map_err(|e| StartupError::new("access tokens", e))?;
    let cookie_key = auth::cookie_key(config.session.cookie_secret.as_deref()).ok_or(
        StartupError {
            step: "session",
            details: "SESSION__COOKIE_SECRET must be at least 64 bytes".to_string(),
        },
    )?;
    if config.session.cookie_secret.is_none() {
        tracing::warn!("No cookie secret configured, sessions will not survive a restart");
    }

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| StartupError::new("database", e))?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| StartupError::new("migrations", e))?;

    let user_cache =
        RedisUserCache::new(&config.redis).map_err(|e| StartupError::new("user cache", e))?;
    let novu = NovuClient::new(&config.novu).map_err(|e| StartupError::new("notifications", e))?;
    let notifications = NotificationDispatcher::new(Arc::new(novu), config.novu.queue_capacity);

    let users = UserRepository::new(db_pool.clone());
    bootstrap::ensure_super_admin(&users, config.admin.as_ref(), &notifications)
        .await
        .map_err(|e| StartupError::new("super-admin bootstrap", e))?;

    tracing::info!("Discovering OIDC provider...");
    let oidc_client = OidcClient::discover(config.auth0)
        .await
        .map_err(|e| StartupError::new("OIDC discovery", e))?;

    let state = Arc::new(AppState {
        users,
        profiles: ProfileRepository::new(db_pool.clone()),
        awards: AwardRepository::new(db_pool),
        oidc_client,
        tokens,
        providers,
        user_cache: Arc::new(user_cache),
        notifications,
        cookie_key,
        secure_cookies: config.session.secure_cookies,
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| StartupError::new("bind", e))?;
    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::new("server", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
