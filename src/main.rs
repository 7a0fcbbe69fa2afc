use std::error::Error;
use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use workshop_checkout::config::AppConfig;
use workshop_checkout::db::PgStore;
use workshop_checkout::gateway::HttpGateway;
use workshop_checkout::routes::create_routes;
use workshop_checkout::session::MemorySessionStore;
use workshop_checkout::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Successfully connected to database");

    sqlx::migrate!().run(&pool).await?;

    tracing::info!("Migrations run successfully");

    let gateway = HttpGateway::from_config(&config.gateway)?;
    let sessions = MemorySessionStore::new(config.session_ttl);
    let addr = config.bind_addr;

    let state = AppState::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(sessions),
        Arc::new(gateway),
        config,
    );
    let app = create_routes(state);

    tracing::info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
