//! Catalog and resource stores.
//!
//! Both stores are traits so a database-backed implementation can replace
//! the in-memory one. The resource store enforces parent ordering: a subnet
//! is only recorded under a known network, a port only under a known subnet.

use crate::model::{CatalogIntent, NetworkResource, PortResource, SubnetResource};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Catalog {0} already exists")]
    DuplicateCatalog(String),

    #[error("Cluster {cluster_id} already has network {network_id}")]
    DuplicateNetwork {
        cluster_id: String,
        network_id: String,
    },

    #[error("Network {0} is not recorded")]
    UnknownNetwork(String),

    #[error("Subnet {0} is not recorded")]
    UnknownSubnet(String),
}

/// Persisted catalog intents
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// All catalogs, ordered by cluster id
    async fn list(&self) -> Result<Vec<CatalogIntent>, StoreError>;

    /// Persist a new catalog; cluster ids are unique
    async fn create(&self, intent: CatalogIntent) -> Result<CatalogIntent, StoreError>;

    async fn get(&self, cluster_id: &str) -> Result<Option<CatalogIntent>, StoreError>;
}

/// Network, subnet and port records for a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResources {
    pub network: NetworkResource,
    pub subnets: Vec<SubnetResource>,
    pub ports: Vec<PortResource>,
}

/// Persisted provisioning records
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    /// Record a cluster's network; at most one per cluster
    async fn insert_network(&self, network: NetworkResource) -> Result<(), StoreError>;

    /// Record a subnet under an already recorded network
    async fn insert_subnet(&self, subnet: SubnetResource) -> Result<(), StoreError>;

    /// Record a port under an already recorded subnet
    async fn insert_port(&self, port: PortResource) -> Result<(), StoreError>;

    async fn network_for_cluster(
        &self,
        cluster_id: &str,
    ) -> Result<Option<NetworkResource>, StoreError>;

    async fn cluster_resources(
        &self,
        cluster_id: &str,
    ) -> Result<Option<ClusterResources>, StoreError>;

    /// Forget a cluster's network and everything recorded under it
    async fn remove_cluster(
        &self,
        cluster_id: &str,
    ) -> Result<Option<ClusterResources>, StoreError>;
}

#[derive(Debug, Default)]
struct ResourceTables {
    networks: HashMap<String, NetworkResource>,
    network_by_cluster: HashMap<String, String>,
    subnets: HashMap<String, SubnetResource>,
    ports: HashMap<String, PortResource>,
}

/// In-process implementation of both stores
#[derive(Debug, Default)]
pub struct InMemoryStore {
    catalogs: RwLock<BTreeMap<String, CatalogIntent>>,
    resources: RwLock<ResourceTables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryStore {
    async fn list(&self) -> Result<Vec<CatalogIntent>, StoreError> {
        Ok(self.catalogs.read().await.values().cloned().collect())
    }

    async fn create(&self, intent: CatalogIntent) -> Result<CatalogIntent, StoreError> {
        let mut catalogs = self.catalogs.write().await;
        if catalogs.contains_key(&intent.cluster_id) {
            return Err(StoreError::DuplicateCatalog(intent.cluster_id));
        }
        debug!("Stored catalog {}", intent.cluster_id);
        catalogs.insert(intent.cluster_id.clone(), intent.clone());
        Ok(intent)
    }

    async fn get(&self, cluster_id: &str) -> Result<Option<CatalogIntent>, StoreError> {
        Ok(self.catalogs.read().await.get(cluster_id).cloned())
    }
}

#[async_trait::async_trait]
impl ResourceStore for InMemoryStore {
    async fn insert_network(&self, network: NetworkResource) -> Result<(), StoreError> {
        let mut tables = self.resources.write().await;
        if let Some(existing) = tables.network_by_cluster.get(&network.cluster_id) {
            return Err(StoreError::DuplicateNetwork {
                cluster_id: network.cluster_id.clone(),
                network_id: existing.clone(),
            });
        }
        tables
            .network_by_cluster
            .insert(network.cluster_id.clone(), network.network_id.clone());
        tables.networks.insert(network.network_id.clone(), network);
        Ok(())
    }

    async fn insert_subnet(&self, subnet: SubnetResource) -> Result<(), StoreError> {
        let mut tables = self.resources.write().await;
        if !tables.networks.contains_key(&subnet.network_id) {
            return Err(StoreError::UnknownNetwork(subnet.network_id));
        }
        tables.subnets.insert(subnet.subnet_id.clone(), subnet);
        Ok(())
    }

    async fn insert_port(&self, port: PortResource) -> Result<(), StoreError> {
        let mut tables = self.resources.write().await;
        if !tables.subnets.contains_key(&port.subnet_id) {
            return Err(StoreError::UnknownSubnet(port.subnet_id));
        }
        tables.ports.insert(port.port_id.clone(), port);
        Ok(())
    }

    async fn network_for_cluster(
        &self,
        cluster_id: &str,
    ) -> Result<Option<NetworkResource>, StoreError> {
        let tables = self.resources.read().await;
        Ok(tables
            .network_by_cluster
            .get(cluster_id)
            .and_then(|id| tables.networks.get(id))
            .cloned())
    }

    async fn cluster_resources(
        &self,
        cluster_id: &str,
    ) -> Result<Option<ClusterResources>, StoreError> {
        let tables = self.resources.read().await;
        let Some(network) = tables
            .network_by_cluster
            .get(cluster_id)
            .and_then(|id| tables.networks.get(id))
        else {
            return Ok(None);
        };

        let mut subnets: Vec<SubnetResource> = tables
            .subnets
            .values()
            .filter(|s| s.network_id == network.network_id)
            .cloned()
            .collect();
        subnets.sort_by_key(|s| s.created_at);

        let mut ports: Vec<PortResource> = tables
            .ports
            .values()
            .filter(|p| p.network_id == network.network_id)
            .cloned()
            .collect();
        ports.sort_by_key(|p| p.created_at);

        Ok(Some(ClusterResources {
            network: network.clone(),
            subnets,
            ports,
        }))
    }

    async fn remove_cluster(
        &self,
        cluster_id: &str,
    ) -> Result<Option<ClusterResources>, StoreError> {
        let mut guard = self.resources.write().await;
        let tables = &mut *guard;
        let Some(network) = tables
            .network_by_cluster
            .remove(cluster_id)
            .and_then(|id| tables.networks.remove(&id))
        else {
            return Ok(None);
        };

        let mut subnets: Vec<SubnetResource> = Vec::new();
        tables.subnets.retain(|_, s| {
            let keep = s.network_id != network.network_id;
            if !keep {
                subnets.push(s.clone());
            }
            keep
        });
        subnets.sort_by_key(|s| s.created_at);

        let mut ports: Vec<PortResource> = Vec::new();
        tables.ports.retain(|_, p| {
            let keep = p.network_id != network.network_id;
            if !keep {
                ports.push(p.clone());
            }
            keep
        });
        ports.sort_by_key(|p| p.created_at);

        debug!(
            "Removed network {} for cluster {} ({} subnets, {} ports)",
            network.network_id,
            cluster_id,
            subnets.len(),
            ports.len()
        );
        Ok(Some(ClusterResources {
            network,
            subnets,
            ports,
        }))
    }
}
