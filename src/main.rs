use std::sync::Arc;

mod app;
mod auth;
mod config;
mod db;
mod state;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "bookclub=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::load()?);

    // An unreachable database is fatal: nothing is served without it.
    let db = db::connect(&config.database).await?;
    db::migrate(&db).await?;

    let state = AppState::from_parts(config.clone(), db.clone())?;
    let result = app::serve(app::build_app(state), &config.server).await;

    db.close().await;
    tracing::info!("database pool closed");
    result
}
