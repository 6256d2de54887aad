use anyhow::Context;
use event_service::config::load_service_config;
use event_service::store::{run_migrations, Stores};
use event_service::{build_router, AppState};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_service_config()?;

    let stores = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("Failed to connect to DATABASE_URL")?;
            run_migrations(&pool)
                .await
                .context("Failed to apply migrations")?;
            Stores::postgres(pool)
        }
        None => {
            info!("DATABASE_URL not set; using in-memory stores");
            Stores::in_memory()
        }
    };

    let addr = config.bind_addr();
    let app = build_router(AppState::new(config, stores));

    info!(%addr, "starting event-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
