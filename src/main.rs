use mailgate::{
    clock::SystemClock,
    config::{validate_production_config, AppConfig, SessionConfig},
    db,
    routes::build_router,
    services::{create_email_service, EmailService},
    AppState,
};

use std::{net::SocketAddr, sync::Arc};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailgate=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    validate_production_config()?;

    // Database connection
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let email_service: Arc<dyn EmailService> = Arc::from(create_email_service());
    let app_state = AppState::new(&pool, &config, email_service, Arc::new(SystemClock));

    if let Some(every) = config.cleanup_interval {
        tracing::info!("Scheduling token cleanup every {}s", every.as_secs());
        app_state.cleanup_service.clone().spawn_periodic(every);
    }

    // Session store
    let session_store = SqliteStore::new(pool.clone()).with_table_name("sessions")?;
    session_store.migrate().await?;
    let session_layer = SessionConfig::from_env().create_layer(session_store);

    let app = build_router(app_state, session_layer);

    let addr = config.socket_addr();
    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
