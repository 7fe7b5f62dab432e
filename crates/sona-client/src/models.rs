//! SONA API models
//!
//! Request bodies follow the Neutron-style JSON accepted by the ONOS
//! openstacknetworking REST API (`{"network": {...}}`, `{"subnet": {...}}`,
//! `{"port": {...}}`).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// Status code SONA returns when a resource was created.
pub const STATUS_CREATED: u16 = 201;

/// Network type used for every tenant network.
pub const NETWORK_TYPE_VXLAN: &str = "vxlan";

/// Device owner recorded on onboarding ports.
pub const PORT_DEVICE_OWNER: &str = "compute:nova";

/// Provisioning operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionOperation {
    /// Network creation
    Network,
    /// Subnet creation
    Subnet,
    /// Port creation
    Port,
}

impl ProvisionOperation {
    /// Path segment of the collection endpoint for this operation
    pub fn collection(&self) -> &'static str {
        match self {
            ProvisionOperation::Network => "networks",
            ProvisionOperation::Subnet => "subnets",
            ProvisionOperation::Port => "ports",
        }
    }
}

impl fmt::Display for ProvisionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionOperation::Network => write!(f, "network"),
            ProvisionOperation::Subnet => write!(f, "subnet"),
            ProvisionOperation::Port => write!(f, "port"),
        }
    }
}

/// Outcome of a single provisioning call
///
/// Carries the raw upstream status and body so callers can surface the
/// provider's error payload verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionResponse {
    /// HTTP status code returned by SONA
    pub status: u16,
    /// Response body as returned by SONA
    pub body: String,
}

impl ProvisionResponse {
    /// Build a response from a status and body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A `201 Created` response with an empty body
    pub fn created() -> Self {
        Self::new(STATUS_CREATED, "")
    }

    /// Whether the resource was created (status 201)
    pub fn is_success(&self) -> bool {
        self.status == STATUS_CREATED
    }
}

/// Network creation intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub network_id: String,
    pub segment_id: u32,
    pub tenant_id: String,
}

impl NetworkRequest {
    /// Render the Neutron-style request body
    pub fn to_body(&self) -> Value {
        json!({
            "network": {
                "id": self.network_id,
                "tenant_id": self.tenant_id,
                "name": format!("network-{}", self.network_id),
                "admin_state_up": true,
                "status": "ACTIVE",
                "shared": false,
                "router:external": false,
                "provider:network_type": NETWORK_TYPE_VXLAN,
                "provider:segmentation_id": self.segment_id,
            }
        })
    }
}

/// Subnet creation intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRequest {
    pub network_id: String,
    pub subnet_id: String,
    pub tenant_id: String,
    pub cidr: String,
    pub start_ip: String,
    pub end_ip: String,
    pub gateway: String,
}

impl SubnetRequest {
    /// Render the Neutron-style request body
    pub fn to_body(&self) -> Value {
        json!({
            "subnet": {
                "id": self.subnet_id,
                "network_id": self.network_id,
                "tenant_id": self.tenant_id,
                "name": format!("subnet-{}", self.subnet_id),
                "ip_version": 4,
                "cidr": self.cidr,
                "gateway_ip": self.gateway,
                "enable_dhcp": true,
                "allocation_pools": [
                    { "start": self.start_ip, "end": self.end_ip }
                ],
            }
        })
    }
}

/// Port creation intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRequest {
    pub network_id: String,
    pub subnet_id: String,
    pub port_id: String,
    pub ip_address: String,
    pub tenant_id: String,
    pub mac_address: String,
}

impl PortRequest {
    /// Render the Neutron-style request body
    pub fn to_body(&self) -> Value {
        json!({
            "port": {
                "id": self.port_id,
                "network_id": self.network_id,
                "tenant_id": self.tenant_id,
                "name": "",
                "admin_state_up": true,
                "status": "ACTIVE",
                "mac_address": self.mac_address,
                "device_owner": PORT_DEVICE_OWNER,
                "fixed_ips": [
                    { "subnet_id": self.subnet_id, "ip_address": self.ip_address }
                ],
            }
        })
    }
}
