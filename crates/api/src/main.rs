//! Flowguard Inference Gateway - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, GatewayConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::load().context("failed to load configuration")?;
    init_logging(&config);

    info!("=== Flowguard inference gateway v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Model: {} | Schema: {}",
        config.model_path.display(),
        config.schema_path.display()
    );

    if let Err(e) = run_server(config).await {
        error!("Gateway failed: {}", e);
        return Err(e).context("gateway did not start or stopped with an error");
    }

    Ok(())
}
