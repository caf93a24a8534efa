use anyhow::Context;
use tracing_subscriber::EnvFilter;

use store_backoffice::app::{self, AppState};
use store_backoffice::config::CONFIG;
use store_backoffice::database::DatabaseManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("store_backoffice=info,tower_http=info")),
        )
        .init();

    tracing::info!("Starting store back office in {:?} mode", CONFIG.environment);

    let pool = DatabaseManager::connect(&CONFIG.database).await?;
    if CONFIG.database.run_migrations {
        DatabaseManager::migrate(&pool).await?;
    }

    let bind_addr = format!("0.0.0.0:{}", CONFIG.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app::router(AppState::new(pool))).await?;
    Ok(())
}
