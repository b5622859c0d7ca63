//! KOI Disposition Server - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, ServiceConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::load().context("failed to load configuration")?;
    init_logging(config.json_logs)?;

    info!("=== KOI Disposition Service v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Model artifact {}, reference dataset {}, threshold {}",
        config.artifact_path.display(),
        config.reference_path.display(),
        config.decision_threshold
    );

    run_server(config).await
}
