mod config;
mod constants;
mod core_cli;
mod core_ftpcommand;
mod core_log;
mod core_network;
mod core_transfer;
mod core_vfs;
mod helpers;
mod server;
mod session;

use crate::core_cli::Cli;
use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    core_log::init_logger(args.verbose);

    let mut config = config::load_config(&args.config)?;

    // Override the control port from CLI if provided
    if let Some(port) = args.port {
        config.server.listen_port = port;
    }

    server::run(config).await?;

    Ok(())
}
