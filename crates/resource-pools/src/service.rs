//! Allocation service traits
//!
//! The onboarding orchestrator talks to allocators through these traits and
//! wraps every call in a deadline, so an out-of-process allocator can be
//! dropped in without changing the workflow.

use crate::error::PoolError;
use crate::host::{HostAllocator, HostAssignment, ResourceRequest};
use crate::ip::IpAllocator;
use std::net::Ipv4Addr;

/// Host placement service
#[async_trait::async_trait]
pub trait HostAllocation: Send + Sync {
    /// Place a cluster on a host (idempotent per cluster id)
    async fn allocate(
        &self,
        cluster_id: &str,
        request: ResourceRequest,
    ) -> Result<HostAssignment, PoolError>;

    /// Host a cluster was placed on
    async fn host_ip(&self, cluster_id: &str) -> Result<Ipv4Addr, PoolError>;

    /// Return a cluster's capacity to its host
    async fn release(&self, cluster_id: &str) -> Option<HostAssignment>;
}

/// Port address service
#[async_trait::async_trait]
pub trait IpAllocation: Send + Sync {
    /// Workload subnet address for a port (idempotent per port id)
    async fn allocate_ip(&self, port_id: &str) -> Result<Ipv4Addr, PoolError>;

    /// Bootstrap network address for a port (idempotent per port id)
    async fn bootstrap_ip(&self, port_id: &str) -> Result<Ipv4Addr, PoolError>;

    /// Return a port's workload and bootstrap addresses to their pools
    async fn release(&self, port_id: &str) -> Vec<Ipv4Addr>;
}

#[async_trait::async_trait]
impl HostAllocation for HostAllocator {
    async fn allocate(
        &self,
        cluster_id: &str,
        request: ResourceRequest,
    ) -> Result<HostAssignment, PoolError> {
        HostAllocator::allocate(self, cluster_id, request)
    }

    async fn host_ip(&self, cluster_id: &str) -> Result<Ipv4Addr, PoolError> {
        HostAllocator::host_ip(self, cluster_id)
    }

    async fn release(&self, cluster_id: &str) -> Option<HostAssignment> {
        HostAllocator::release(self, cluster_id)
    }
}

#[async_trait::async_trait]
impl IpAllocation for IpAllocator {
    async fn allocate_ip(&self, port_id: &str) -> Result<Ipv4Addr, PoolError> {
        IpAllocator::allocate_ip(self, port_id)
    }

    async fn bootstrap_ip(&self, port_id: &str) -> Result<Ipv4Addr, PoolError> {
        IpAllocator::bootstrap_ip(self, port_id)
    }

    async fn release(&self, port_id: &str) -> Vec<Ipv4Addr> {
        let (workload, bootstrap) = IpAllocator::release(self, port_id);
        workload.into_iter().chain(bootstrap).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostCapacity;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_placements_get_disjoint_hosts() {
        let hosts = (68..72)
            .map(|o| HostCapacity::new(Ipv4Addr::new(10, 2, 1, o), 4, 8192, 100))
            .collect();
        let allocator: Arc<dyn HostAllocation> = Arc::new(HostAllocator::new(hosts).unwrap());

        let mut tasks = Vec::new();
        for i in 0..4 {
            let allocator = Arc::clone(&allocator);
            tasks.push(tokio::spawn(async move {
                allocator
                    .allocate(&format!("c{i}"), ResourceRequest::new(4, 4096, 20))
                    .await
            }));
        }

        let mut hosts = HashSet::new();
        for task in tasks {
            hosts.insert(task.await.unwrap().unwrap().host_ip);
        }
        assert_eq!(hosts.len(), 4);

        let fifth = allocator
            .allocate("c4", ResourceRequest::new(4, 4096, 20))
            .await;
        assert!(matches!(fifth, Err(PoolError::CapacityExhausted { .. })));
    }

    #[tokio::test]
    async fn test_service_delegates_to_pools() {
        let allocator: Arc<dyn IpAllocation> = Arc::new(IpAllocator::new(
            "10.10.1.3-10.10.1.254".parse().unwrap(),
            "192.168.0.2-192.168.0.254".parse().unwrap(),
        ));

        let ip = allocator.allocate_ip("port-1").await.unwrap();
        assert_eq!(allocator.allocate_ip("port-1").await.unwrap(), ip);
        assert_eq!(
            allocator.bootstrap_ip("port-1").await.unwrap(),
            Ipv4Addr::new(192, 168, 0, 2)
        );

        let released = allocator.release("port-1").await;
        assert_eq!(released, vec![ip, Ipv4Addr::new(192, 168, 0, 2)]);
        assert!(allocator.release("port-1").await.is_empty());
    }

    #[tokio::test]
    async fn test_released_host_capacity_is_reusable() {
        let hosts = vec![HostCapacity::new(Ipv4Addr::new(10, 2, 1, 68), 4, 8192, 100)];
        let allocator: Arc<dyn HostAllocation> = Arc::new(HostAllocator::new(hosts).unwrap());
        allocator
            .allocate("c1", ResourceRequest::new(4, 4096, 20))
            .await
            .unwrap();

        let released = allocator.release("c1").await.unwrap();
        assert_eq!(released.cluster_id, "c1");
        assert!(allocator.host_ip("c1").await.is_err());
        allocator
            .allocate("c2", ResourceRequest::new(4, 4096, 20))
            .await
            .unwrap();
    }
}
