//! Onboarding data model.
//!
//! `CatalogIntent` is the validated input to the workflow. The network,
//! subnet and port records are the local half of each provisioning step;
//! they convert into the matching SONA request so the local and remote
//! views never drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sona_client::{NetworkRequest, PortRequest, SubnetRequest};

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validated catalog entry: the desired cluster's compute and software
///
/// Memory is in MB, storage in GB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogIntent {
    pub cluster_id: String,
    pub vcpus: u32,
    pub memory: u64,
    pub storage: u64,
    pub k8s_version: String,
    pub os_image: String,
}

impl CatalogIntent {
    /// Check every required field, reporting all failures at once
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.cluster_id.trim().is_empty() {
            errors.push(FieldError::new("clusterId", "must not be blank"));
        }
        if self.vcpus == 0 {
            errors.push(FieldError::new("vcpus", "must be greater than zero"));
        }
        if self.memory == 0 {
            errors.push(FieldError::new("memory", "must be greater than zero"));
        }
        if self.storage == 0 {
            errors.push(FieldError::new("storage", "must be greater than zero"));
        }
        if self.k8s_version.trim().is_empty() {
            errors.push(FieldError::new("k8sVersion", "must not be blank"));
        }
        if self.os_image.trim().is_empty() {
            errors.push(FieldError::new("osImage", "must not be blank"));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Catalog payload as received over HTTP
///
/// Accepts the legacy `version` / `image` field names as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRequest {
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub vcpus: Option<u32>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub storage: Option<u64>,
    #[serde(default, alias = "version")]
    pub k8s_version: Option<String>,
    #[serde(default, alias = "image")]
    pub os_image: Option<String>,
}

impl CatalogRequest {
    /// Fill in a generated cluster id when none was supplied
    pub fn with_generated_cluster_id(mut self) -> Self {
        let blank = self
            .cluster_id
            .as_deref()
            .is_none_or(|id| id.trim().is_empty());
        if blank {
            self.cluster_id = Some(uuid::Uuid::new_v4().to_string());
        }
        self
    }

    /// Validate into an immutable intent
    pub fn into_intent(self) -> Result<CatalogIntent, Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut required = |field: &str, present: bool| {
            if !present {
                errors.push(FieldError::new(field, "is required"));
            }
        };
        required("clusterId", self.cluster_id.is_some());
        required("vcpus", self.vcpus.is_some());
        required("memory", self.memory.is_some());
        required("storage", self.storage.is_some());
        required("k8sVersion", self.k8s_version.is_some());
        required("osImage", self.os_image.is_some());
        if !errors.is_empty() {
            return Err(errors);
        }

        let intent = CatalogIntent {
            cluster_id: self.cluster_id.unwrap_or_default().trim().to_string(),
            vcpus: self.vcpus.unwrap_or_default(),
            memory: self.memory.unwrap_or_default(),
            storage: self.storage.unwrap_or_default(),
            k8s_version: self.k8s_version.unwrap_or_default().trim().to_string(),
            os_image: self.os_image.unwrap_or_default().trim().to_string(),
        };
        intent.validate()?;
        Ok(intent)
    }
}

/// Tenant network created for one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkResource {
    pub cluster_id: String,
    pub network_id: String,
    pub segment_id: u32,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
}

impl NetworkResource {
    pub fn to_request(&self) -> NetworkRequest {
        NetworkRequest {
            network_id: self.network_id.clone(),
            segment_id: self.segment_id,
            tenant_id: self.tenant_id.clone(),
        }
    }
}

/// Subnet on a tenant network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetResource {
    pub network_id: String,
    pub subnet_id: String,
    pub tenant_id: String,
    pub cidr: String,
    pub start_ip: String,
    pub end_ip: String,
    pub gateway: String,
    pub created_at: DateTime<Utc>,
}

impl SubnetResource {
    pub fn to_request(&self) -> SubnetRequest {
        SubnetRequest {
            network_id: self.network_id.clone(),
            subnet_id: self.subnet_id.clone(),
            tenant_id: self.tenant_id.clone(),
            cidr: self.cidr.clone(),
            start_ip: self.start_ip.clone(),
            end_ip: self.end_ip.clone(),
            gateway: self.gateway.clone(),
        }
    }
}

/// Port on a tenant subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortResource {
    pub port_id: String,
    pub subnet_id: String,
    pub network_id: String,
    pub tenant_id: String,
    pub ip_address: String,
    pub mac_address: String,
    pub created_at: DateTime<Utc>,
}

impl PortResource {
    pub fn to_request(&self) -> PortRequest {
        PortRequest {
            network_id: self.network_id.clone(),
            subnet_id: self.subnet_id.clone(),
            port_id: self.port_id.clone(),
            ip_address: self.ip_address.clone(),
            tenant_id: self.tenant_id.clone(),
            mac_address: self.mac_address.clone(),
        }
    }
}
