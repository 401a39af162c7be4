//! preop-api - Preoperational inspection submission service
//!
//! Drivers log in with name + PIN, submit one inspection per trip, and
//! receive a PDF back; every 15th pending inspection per driver is
//! rolled up into a consolidated report.

use anyhow::Result;
use clap::Parser;
use preop_api::{build_router, AppState};
use preop_common::config::{resolve_data_root, ServiceConfig, StorageConfig};
use preop_common::db::init_database;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "preop-api", version, about = "Preoperational inspection service")]
struct Args {
    /// Data root folder (database + generated artifacts)
    #[arg(long)]
    data_root: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PREOP_PORT", default_value_t = 5780)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting preop-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let data_root = resolve_data_root(args.data_root.as_deref(), "PREOP_DATA_ROOT")?;
    std::fs::create_dir_all(&data_root)?;
    info!("Data root: {}", data_root.display());

    let db_path = data_root.join("preop.db");
    let pool = init_database(&db_path).await?;

    let storage = StorageConfig::new(&data_root);
    let config = ServiceConfig {
        port: args.port,
        ..ServiceConfig::default()
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(pool, storage, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("preop-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
