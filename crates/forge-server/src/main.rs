use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use forge_core::config::Config;
use model_gateway::{GatewayConfig, HttpGateway};

#[derive(Parser)]
#[command(
    name = "forge-server",
    about = "HTTP API front-end for the forge orchestration engine",
    version
)]
struct Args {
    /// Workspace root
    #[arg(long, env = "FORGE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Port to listen on (0 = OS-assigned)
    #[arg(long, default_value = "3920")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let config = Config::load(&args.root).context("failed to load config")?;
    let gateway = HttpGateway::new(GatewayConfig {
        base_url: config.model.base_url.clone(),
        model: config.model.model.clone(),
        api_key: config.api_key(),
        timeout: config.model_timeout(),
    })
    .context("failed to build model gateway")?;

    forge_server::serve(args.root, Arc::new(gateway), args.port).await
}
