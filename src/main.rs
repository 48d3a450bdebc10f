use dotenvy::dotenv;
use log::info;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use taskboard::api_router::configure_api_routes;
use taskboard::bootstrap;
use taskboard::config::AppConfig;
use taskboard::shared::state::AppState;
use taskboard::shared::utils::create_conn;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database_url())
        .map_err(|e| anyhow::anyhow!("Database pool creation failed: {e}"))?;

    bootstrap::initialize(&pool)?;

    let state = Arc::new(AppState {
        conn: pool,
        config: config.clone(),
    });
    let app = configure_api_routes()
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting HTTP server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
