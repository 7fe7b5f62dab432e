//! Allocation errors

use crate::host::ResourceRequest;
use thiserror::Error;

/// Errors returned by the host and IP allocators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// No known host has enough free capacity
    #[error("No host can satisfy {requested} for cluster {cluster_id}")]
    CapacityExhausted {
        cluster_id: String,
        requested: ResourceRequest,
    },

    /// Every address in the pool is mapped to a live port
    #[error("IP pool {pool} exhausted")]
    PoolExhausted { pool: String },

    /// The cluster was never placed on a host
    #[error("No host assigned to cluster {0}")]
    UnknownCluster(String),

    /// Invalid pool configuration
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
}
