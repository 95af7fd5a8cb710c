use pollduel::config::Config;
use pollduel::database::{create_pool, run_migrations};
use pollduel::redis::RedisClient;
use pollduel::services::background_jobs::BackgroundJobsService;
use pollduel::services::realtime_service::{RealtimeHub, spawn_redis_bridge};
use pollduel::store::PgStore;
use pollduel::{AppState, create_app};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pollduel=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!("Configuration loaded successfully");

    // Create database connection pool
    let db = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    // Run migrations
    run_migrations(&db).await?;
    tracing::info!("Database migrations completed");

    // Create Redis client
    let redis = Arc::new(RedisClient::new(&config.redis_url).await?);
    tracing::info!("Redis client created");

    let store = Arc::new(PgStore::new(db));

    // Realtime hub with cross-instance fan-out
    let hub = Arc::new(RealtimeHub::with_redis(redis.clone()));
    spawn_redis_bridge(hub.clone(), redis.clone());

    // Start background sweep of expired polls
    let jobs = BackgroundJobsService::new(
        store.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    );
    jobs.start_all_jobs();

    // Create application state
    let state = AppState {
        store,
        hub,
        redis: Some(redis),
        config: Arc::new(config.clone()),
    };

    // Create application
    let app = create_app(state);

    // Create listener
    let listener = TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    tracing::info!("Server listening on {}:{}", config.host, config.port);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
