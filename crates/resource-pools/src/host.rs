//! Host capacity allocation.
//!
//! Hosts are kept in configuration order. A request is placed on the
//! least-loaded host (fewest clusters) that still has room for it, ties
//! going to the host configured first, so the outcome depends only on the
//! current capacity state.

use crate::error::PoolError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Compute resources requested for a cluster.
///
/// Memory is in MB, storage in GB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub vcpus: u32,
    pub memory: u64,
    pub storage: u64,
}

impl ResourceRequest {
    pub fn new(vcpus: u32, memory: u64, storage: u64) -> Self {
        Self {
            vcpus,
            memory,
            storage,
        }
    }

    fn fits_within(&self, free: &ResourceRequest) -> bool {
        self.vcpus <= free.vcpus && self.memory <= free.memory && self.storage <= free.storage
    }

    fn saturating_sub(&self, other: &ResourceRequest) -> ResourceRequest {
        ResourceRequest {
            vcpus: self.vcpus.saturating_sub(other.vcpus),
            memory: self.memory.saturating_sub(other.memory),
            storage: self.storage.saturating_sub(other.storage),
        }
    }

    fn add(&mut self, other: &ResourceRequest) {
        self.vcpus += other.vcpus;
        self.memory += other.memory;
        self.storage += other.storage;
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vCPUs / {} MB memory / {} GB storage",
            self.vcpus, self.memory, self.storage
        )
    }
}

/// Total capacity of one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCapacity {
    pub host_ip: Ipv4Addr,
    pub vcpus: u32,
    pub memory: u64,
    pub storage: u64,
}

impl HostCapacity {
    pub fn new(host_ip: Ipv4Addr, vcpus: u32, memory: u64, storage: u64) -> Self {
        Self {
            host_ip,
            vcpus,
            memory,
            storage,
        }
    }

    fn total(&self) -> ResourceRequest {
        ResourceRequest::new(self.vcpus, self.memory, self.storage)
    }
}

/// Placement of a cluster on a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostAssignment {
    pub cluster_id: String,
    pub host_ip: Ipv4Addr,
    pub vcpus: u32,
    pub memory: u64,
    pub storage: u64,
}

impl HostAssignment {
    fn request(&self) -> ResourceRequest {
        ResourceRequest::new(self.vcpus, self.memory, self.storage)
    }
}

#[derive(Debug)]
struct HostState {
    capacity: HostCapacity,
    used: ResourceRequest,
    clusters: usize,
}

impl HostState {
    fn free(&self) -> ResourceRequest {
        self.capacity.total().saturating_sub(&self.used)
    }
}

#[derive(Debug)]
struct HostTable {
    hosts: Vec<HostState>,
    assignments: HashMap<String, HostAssignment>,
}

/// Tracks per-host capacity and the cluster → host mapping.
#[derive(Debug)]
pub struct HostAllocator {
    table: Mutex<HostTable>,
}

impl HostAllocator {
    /// Creates an allocator over the given hosts.
    ///
    /// Fails if the same host address is listed twice.
    pub fn new(hosts: Vec<HostCapacity>) -> Result<Self, PoolError> {
        let mut states: Vec<HostState> = Vec::with_capacity(hosts.len());
        for capacity in hosts {
            if states.iter().any(|s| s.capacity.host_ip == capacity.host_ip) {
                return Err(PoolError::InvalidConfig(format!(
                    "host {} listed more than once",
                    capacity.host_ip
                )));
            }
            states.push(HostState {
                capacity,
                used: ResourceRequest::default(),
                clusters: 0,
            });
        }

        Ok(Self {
            table: Mutex::new(HostTable {
                hosts: states,
                assignments: HashMap::new(),
            }),
        })
    }

    /// Places `cluster_id` on a host with room for `request`.
    ///
    /// Calling again for an already placed cluster returns the existing
    /// assignment without consuming more capacity.
    pub fn allocate(
        &self,
        cluster_id: &str,
        request: ResourceRequest,
    ) -> Result<HostAssignment, PoolError> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = table.assignments.get(cluster_id) {
            if existing.request() != request {
                warn!(
                    "Cluster {} already placed on {} with {}; ignoring new request {}",
                    cluster_id,
                    existing.host_ip,
                    existing.request(),
                    request
                );
            }
            return Ok(existing.clone());
        }

        let selected = table
            .hosts
            .iter()
            .enumerate()
            .filter(|(_, host)| request.fits_within(&host.free()))
            .min_by_key(|(index, host)| (host.clusters, *index))
            .map(|(index, _)| index);

        let Some(index) = selected else {
            return Err(PoolError::CapacityExhausted {
                cluster_id: cluster_id.to_string(),
                requested: request,
            });
        };

        let host = &mut table.hosts[index];
        host.used.add(&request);
        host.clusters += 1;

        let assignment = HostAssignment {
            cluster_id: cluster_id.to_string(),
            host_ip: host.capacity.host_ip,
            vcpus: request.vcpus,
            memory: request.memory,
            storage: request.storage,
        };
        debug!("Host {} free after placement: {}", host.capacity.host_ip, host.free());

        table
            .assignments
            .insert(cluster_id.to_string(), assignment.clone());
        info!("Placed cluster {} on host {} ({})", cluster_id, assignment.host_ip, request);
        Ok(assignment)
    }

    /// Returns the host a cluster was placed on.
    pub fn host_ip(&self, cluster_id: &str) -> Result<Ipv4Addr, PoolError> {
        self.assignment(cluster_id)
            .map(|a| a.host_ip)
            .ok_or_else(|| PoolError::UnknownCluster(cluster_id.to_string()))
    }

    /// Returns the full assignment for a cluster, if any.
    pub fn assignment(&self, cluster_id: &str) -> Option<HostAssignment> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.assignments.get(cluster_id).cloned()
    }

    /// Releases a cluster's placement and returns its capacity to the host.
    pub fn release(&self, cluster_id: &str) -> Option<HostAssignment> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let assignment = table.assignments.remove(cluster_id)?;

        if let Some(host) = table
            .hosts
            .iter_mut()
            .find(|h| h.capacity.host_ip == assignment.host_ip)
        {
            host.used = host.used.saturating_sub(&assignment.request());
            host.clusters = host.clusters.saturating_sub(1);
        }

        info!("Released cluster {} from host {}", cluster_id, assignment.host_ip);
        Some(assignment)
    }
}
