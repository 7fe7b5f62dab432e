//! Onboarding Controller
//!
//! Onboards managed workload clusters onto Edgetron hosts:
//! - provisions an isolated tenant network, subnet and port through SONA
//! - places the cluster on a host and assigns its workload/bootstrap IPs
//! - renders (and optionally submits) the Cluster API `Cluster` resource
//!
//! Also serves the catalog and chart deployment endpoints.

mod api;
mod config;
mod controller;
mod deploy;
mod error;
mod mac;
mod model;
mod orchestrator;
mod store;
#[cfg(test)]
mod orchestrator_test;
#[cfg(test)]
mod test_utils;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Onboarding Controller");

    // Load configuration from environment variables
    let config = Config::from_env()?;
    config.log_summary();

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
