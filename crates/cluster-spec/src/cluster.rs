//! Cluster API `Cluster` resource
//!
//! The submission document for the cluster provisioning control plane.
//! Kubernetes version and OS distribution travel in the provider spec.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "Cluster",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cluster-wide network configuration
    pub cluster_network: ClusterNetworkingConfig,

    /// Provider-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_spec: Option<ProviderSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkingConfig {
    /// Service network ranges
    pub services: NetworkRanges,

    /// Pod network ranges
    pub pods: NetworkRanges,

    /// DNS domain for services
    pub service_domain: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRanges {
    pub cidr_blocks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderSpec {
    pub value: ClusterProviderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProviderConfig {
    /// Kubernetes version for control plane and workers
    pub kube_version: String,

    /// OS image the nodes boot
    pub os_distro: String,
}
