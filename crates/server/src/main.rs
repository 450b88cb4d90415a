//! Practice-scheduler server binary.

use anyhow::Result;
use revisit_db::Database;
use revisit_server::{create_app, metrics, Config};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;
    metrics::init_metrics();

    let db = match &config.database_url {
        Some(path) => Database::new(path).await?,
        None => Database::open_default().await?,
    };

    let bind_addr = config.bind_addr;
    let app = create_app(db, config);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "revisit-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
