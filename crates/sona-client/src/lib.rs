//! SONA Network Controller Client
//!
//! A Rust client for the SONA (ONOS openstacknetworking) REST API.
//! Translates network, subnet and port intents into Neutron-style
//! provisioning requests against the network controller.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use sona_client::{NetworkProvisioner, NetworkRequest, SonaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SonaClient::new(
//!     "http://10.2.1.33:8181".to_string(),
//!     "onos".to_string(),
//!     "rocks".to_string(),
//!     Duration::from_secs(30),
//! )?;
//!
//! let request = NetworkRequest {
//!     network_id: "8e3a1c8e-6a4b-4d0e-9d55-0f3c1b6f1a10".to_string(),
//!     segment_id: 1,
//!     tenant_id: "1b0d2f0e-8f0c-4d3a-a1b0-5d3a2b1c0e9f".to_string(),
//! };
//! let response = client.create_network(&request).await?;
//! if !response.is_success() {
//!     eprintln!("network rejected: {} {}", response.status, response.body);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Semantics
//!
//! - A provisioning call succeeds only when SONA answers `201 Created`.
//!   Any other status is returned as a [`ProvisionResponse`] carrying the
//!   upstream body, not as an error.
//! - Errors are reserved for requests that never produced a status
//!   (connection failures, client-side timeouts).
//! - The client never retries.

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod provisioner_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::SonaClient;
pub use error::SonaError;
pub use models::*;
pub use provisioner_trait::NetworkProvisioner;
#[cfg(feature = "test-util")]
pub use mock::{MockSonaClient, ProvisionCall};
