use crate::config::{build_mounts, Config};
use crate::core_network::network;
use crate::session::ServerContext;
use anyhow::Result;
use log::{error, info};
use std::sync::Arc;

/// Runs the FTP server with the provided configuration.
///
/// Mounts are brought up first; a backend that fails to initialise is
/// logged and left unavailable rather than aborting startup.
///
/// # Arguments
///
/// * `config` - The validated server configuration.
///
/// # Returns
///
/// Result<(), anyhow::Error> indicating the success or failure of the operation.
pub async fn run(config: Config) -> Result<()> {
    info!(
        "Starting server on {}:{} with {} mount(s)",
        config.server.listen_address,
        config.server.listen_port,
        config.mounts.len()
    );

    let mounts = build_mounts(&config.mounts);
    let context = Arc::new(ServerContext {
        config: config.server,
        mounts,
    });

    match network::start_server(context).await {
        Ok(()) => info!("Server stopped."),
        Err(e) => {
            error!("Server failed: {:#}", e);
            return Err(e);
        }
    }

    Ok(())
}
