//! Cluster descriptor and its builder.
//!
//! The builder accumulates fields through chained `with_*` calls; `build`
//! checks every required field at once and either returns a complete,
//! immutable descriptor or a validation error. There is no way to render
//! a partially filled descriptor.

use crate::cluster::{
    Cluster, ClusterNetworkingConfig, ClusterProviderConfig, ClusterSpec, NetworkRanges,
    ProviderSpec,
};
use crate::error::SpecError;
use ipnetwork::Ipv4Network;
use serde::Serialize;

/// Immutable description of the cluster to provision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescriptor {
    cluster_name: String,
    /// Onboarded cluster this descriptor belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster_id: Option<String>,
    pod_cidr: String,
    service_cidr: String,
    service_domain: String,
    kube_version: String,
    os_distro: String,
}

impl ClusterDescriptor {
    /// Start a new builder
    pub fn builder() -> ClusterDescriptorBuilder {
        ClusterDescriptorBuilder::default()
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn cluster_id(&self) -> Option<&str> {
        self.cluster_id.as_deref()
    }

    /// Name of the Cluster API resource: `<clusterName>-<clusterId>`, or
    /// just the cluster name when no cluster id was given.
    ///
    /// Characters outside `[a-z0-9-]` become `-`.
    pub fn resource_name(&self) -> String {
        let name = match &self.cluster_id {
            Some(id) => format!("{}-{}", self.cluster_name, id),
            None => self.cluster_name.clone(),
        };
        let name: String = name
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        name.trim_matches('-').to_string()
    }

    pub fn pod_cidr(&self) -> &str {
        &self.pod_cidr
    }

    pub fn service_cidr(&self) -> &str {
        &self.service_cidr
    }

    pub fn service_domain(&self) -> &str {
        &self.service_domain
    }

    pub fn kube_version(&self) -> &str {
        &self.kube_version
    }

    pub fn os_distro(&self) -> &str {
        &self.os_distro
    }

    /// Convert to the Cluster API resource
    pub fn to_resource(&self) -> Cluster {
        Cluster::new(
            &self.resource_name(),
            ClusterSpec {
                cluster_network: ClusterNetworkingConfig {
                    services: NetworkRanges {
                        cidr_blocks: vec![self.service_cidr.clone()],
                    },
                    pods: NetworkRanges {
                        cidr_blocks: vec![self.pod_cidr.clone()],
                    },
                    service_domain: self.service_domain.clone(),
                },
                provider_spec: Some(ProviderSpec {
                    value: ClusterProviderConfig {
                        kube_version: self.kube_version.clone(),
                        os_distro: self.os_distro.clone(),
                    },
                }),
            },
        )
    }

    /// Render the submission document (Cluster API YAML)
    pub fn render(&self) -> Result<String, SpecError> {
        Ok(serde_yaml::to_string(&self.to_resource())?)
    }
}

/// Chained builder for [`ClusterDescriptor`]
#[derive(Debug, Clone, Default)]
pub struct ClusterDescriptorBuilder {
    cluster_name: Option<String>,
    cluster_id: Option<String>,
    pod_cidr: Option<String>,
    service_cidr: Option<String>,
    service_domain: Option<String>,
    kube_version: Option<String>,
    os_distro: Option<String>,
}

impl ClusterDescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster_name(mut self, cluster_name: impl Into<String>) -> Self {
        self.cluster_name = Some(cluster_name.into());
        self
    }

    pub fn with_cluster_id(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    pub fn with_pod_cidr(mut self, pod_cidr: impl Into<String>) -> Self {
        self.pod_cidr = Some(pod_cidr.into());
        self
    }

    pub fn with_service_cidr(mut self, service_cidr: impl Into<String>) -> Self {
        self.service_cidr = Some(service_cidr.into());
        self
    }

    pub fn with_service_domain(mut self, service_domain: impl Into<String>) -> Self {
        self.service_domain = Some(service_domain.into());
        self
    }

    pub fn with_kube_version(mut self, kube_version: impl Into<String>) -> Self {
        self.kube_version = Some(kube_version.into());
        self
    }

    pub fn with_os_distro(mut self, os_distro: impl Into<String>) -> Self {
        self.os_distro = Some(os_distro.into());
        self
    }

    /// Validate and produce the descriptor.
    ///
    /// Blank values count as unset. All missing fields are reported together.
    pub fn build(self) -> Result<ClusterDescriptor, SpecError> {
        let mut missing = Vec::new();
        let mut take = |value: Option<String>, field: &'static str| {
            match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(field);
                    String::new()
                }
            }
        };

        let cluster_name = take(self.cluster_name, "clusterName");
        let cluster_id = self
            .cluster_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let pod_cidr = take(self.pod_cidr, "podCidr");
        let service_cidr = take(self.service_cidr, "serviceCidr");
        let service_domain = take(self.service_domain, "serviceDomain");
        let kube_version = take(self.kube_version, "kubeVersion");
        let os_distro = take(self.os_distro, "osDistro");

        if !missing.is_empty() {
            return Err(SpecError::MissingFields(missing));
        }

        check_cidr("podCidr", &pod_cidr)?;
        check_cidr("serviceCidr", &service_cidr)?;

        Ok(ClusterDescriptor {
            cluster_name,
            cluster_id,
            pod_cidr,
            service_cidr,
            service_domain,
            kube_version,
            os_distro,
        })
    }

    /// Build and render in one step
    pub fn render(self) -> Result<String, SpecError> {
        self.build()?.render()
    }
}

fn check_cidr(field: &'static str, value: &str) -> Result<(), SpecError> {
    value
        .parse::<Ipv4Network>()
        .map(|_| ())
        .map_err(|_| SpecError::InvalidCidr {
            field,
            value: value.to_string(),
        })
}
