// Contest Draw - Web Server
// REST API with Axum over the shared SQLite store

use anyhow::{Context, Result};
use axum::Router;
use contest_draw::api::{router, AppState};
use contest_draw::config::AppConfig;
use contest_draw::{count_entries, open_database, telemetry};
use tower_http::cors::CorsLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init(&config.telemetry).context("failed to initialise logging")?;

    let conn = open_database(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    info!(
        database = %config.database_path.display(),
        entries = count_entries(&conn)?,
        policy = %config.draw.policy,
        "database opened"
    );

    if config.server.clear_password.is_none() {
        info!("CLEAR_DB_PASSWORD not set, /api/clear is disabled");
    }

    let state = AppState::new(conn, config.draw, config.server.clear_password.clone());

    let app = Router::new()
        .nest("/api", router(state))
        .layer(CorsLayer::permissive());

    let addr = config.server.socket_addr().context("invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
