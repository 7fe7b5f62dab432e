//! NetworkProvisioner trait
//!
//! Abstracts the network controller so the onboarding workflow can run
//! against the real SONA client or an in-memory mock.

use crate::error::SonaError;
use crate::models::{NetworkRequest, PortRequest, ProvisionResponse, SubnetRequest};

/// Network/subnet/port provisioning against a network controller.
///
/// Every method performs at most one remote attempt. A returned
/// [`ProvisionResponse`] is successful only when its status is 201.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait NetworkProvisioner: Send + Sync {
    /// Create a virtual network
    async fn create_network(&self, request: &NetworkRequest) -> Result<ProvisionResponse, SonaError>;

    /// Create a subnet on an existing network
    async fn create_subnet(&self, request: &SubnetRequest) -> Result<ProvisionResponse, SonaError>;

    /// Create a port on an existing subnet
    async fn create_port(&self, request: &PortRequest) -> Result<ProvisionResponse, SonaError>;
}
