pub mod build;
pub mod config;
pub mod generate;
pub mod init;
pub mod memory;
pub mod meta;
pub mod tasks;

use std::sync::Arc;

use anyhow::Context;
use forge_core::config::Config;
use model_gateway::{ChatBackend, GatewayConfig, HttpGateway};

/// Build the HTTP chat backend from workspace config.
pub(crate) fn backend(config: &Config) -> anyhow::Result<Arc<dyn ChatBackend>> {
    let gateway = HttpGateway::new(GatewayConfig {
        base_url: config.model.base_url.clone(),
        model: config.model.model.clone(),
        api_key: config.api_key(),
        timeout: config.model_timeout(),
    })
    .context("failed to build model gateway")?;
    Ok(Arc::new(gateway))
}

/// Commands drive async engine operations from a sync CLI; each builds one
/// runtime and blocks on it.
pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start tokio runtime")
}

/// Shared test-output printer for `build`/`meta-build --run-tests` and
/// `forge test`.
pub(crate) fn print_test_output(result: &forge_core::process::TestOutput) {
    println!("\nTest run results:");
    println!("Workdir:   {}", result.workdir);
    println!("Command:   {}", result.cmd.join(" "));
    println!("Exit code: {}", result.exit_code);
    println!("STDOUT:");
    println!("{}", if result.stdout.is_empty() { "(no stdout)" } else { &result.stdout });
    println!("STDERR:");
    println!("{}", if result.stderr.is_empty() { "(no stderr)" } else { &result.stderr });
}
