//! Cluster submission boundary.
//!
//! Submission is a single attempt; callers decide what to do on failure.

use crate::cluster::Cluster;
use crate::descriptor::ClusterDescriptor;
use crate::error::SpecError;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::info;

/// Hands a rendered cluster to the provisioning control plane
#[async_trait::async_trait]
pub trait ClusterApi: Send + Sync {
    /// Submit the cluster described by `descriptor`
    async fn submit(&self, descriptor: &ClusterDescriptor) -> Result<(), SpecError>;
}

/// Submits `Cluster` resources to a Kubernetes management cluster
#[derive(Clone)]
pub struct KubeClusterApi {
    api: Api<Cluster>,
}

impl std::fmt::Debug for KubeClusterApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterApi").finish_non_exhaustive()
    }
}

impl KubeClusterApi {
    /// Creates a submitter for `namespace`
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait::async_trait]
impl ClusterApi for KubeClusterApi {
    async fn submit(&self, descriptor: &ClusterDescriptor) -> Result<(), SpecError> {
        let cluster = descriptor.to_resource();
        match self.api.create(&PostParams::default(), &cluster).await {
            Ok(_) => {
                info!("Submitted Cluster {}", descriptor.resource_name());
                Ok(())
            }
            Err(kube::Error::Api(e)) => Err(SpecError::Rejected {
                name: descriptor.resource_name(),
                status: e.code,
                message: e.message.clone(),
            }),
            Err(e) => Err(SpecError::Kube(e)),
        }
    }
}

/// Logs the rendered document instead of submitting it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyClusterApi;

#[async_trait::async_trait]
impl ClusterApi for LogOnlyClusterApi {
    async fn submit(&self, descriptor: &ClusterDescriptor) -> Result<(), SpecError> {
        let document = descriptor.render()?;
        info!(
            "Cluster submission disabled; rendered {}:\n{}",
            descriptor.resource_name(),
            document
        );
        Ok(())
    }
}
