//! Test utilities for unit testing the onboarding workflow
//!
//! Builds an orchestrator wired to the mock SONA client, real in-process
//! allocators, the in-memory store and a recording cluster API.

use crate::mac::MacGenerator;
use crate::model::{CatalogIntent, NetworkResource, PortResource, SubnetResource};
use crate::orchestrator::Orchestrator;
use crate::store::InMemoryStore;
use chrono::Utc;
use cluster_spec::{ClusterApi, ClusterDescriptor, SpecError};
use rand::rngs::mock::StepRng;
use resource_pools::{HostAllocator, HostCapacity, IpAllocator};
use sona_client::MockSonaClient;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Helper to create a valid catalog intent
pub fn create_test_intent(cluster_id: &str) -> CatalogIntent {
    CatalogIntent {
        cluster_id: cluster_id.to_string(),
        vcpus: 2,
        memory: 4096,
        storage: 20,
        k8s_version: "1.28".to_string(),
        os_image: "ubuntu-22".to_string(),
    }
}

pub fn create_test_network(cluster_id: &str, network_id: &str) -> NetworkResource {
    NetworkResource {
        cluster_id: cluster_id.to_string(),
        network_id: network_id.to_string(),
        segment_id: 1,
        tenant_id: "tenant-1".to_string(),
        created_at: Utc::now(),
    }
}

pub fn create_test_subnet(network_id: &str, subnet_id: &str) -> SubnetResource {
    SubnetResource {
        network_id: network_id.to_string(),
        subnet_id: subnet_id.to_string(),
        tenant_id: "tenant-1".to_string(),
        cidr: "10.10.1.0/24".to_string(),
        start_ip: "10.10.1.2".to_string(),
        end_ip: "10.10.1.255".to_string(),
        gateway: "10.10.1.1".to_string(),
        created_at: Utc::now(),
    }
}

pub fn create_test_port(network_id: &str, subnet_id: &str, port_id: &str) -> PortResource {
    PortResource {
        port_id: port_id.to_string(),
        subnet_id: subnet_id.to_string(),
        network_id: network_id.to_string(),
        tenant_id: "tenant-1".to_string(),
        ip_address: "10.10.1.2".to_string(),
        mac_address: "00:16:3e:10:11:12".to_string(),
        created_at: Utc::now(),
    }
}

/// Hosts 10.2.1.68.. with the given vCPU count each (plenty of memory/storage)
pub fn create_test_hosts(count: u8, vcpus: u32) -> Vec<HostCapacity> {
    (0..count)
        .map(|i| HostCapacity::new(Ipv4Addr::new(10, 2, 1, 68 + i), vcpus, 65536, 1000))
        .collect()
}

/// Cluster API that records submissions and can be told to reject them.
/// Like the API server, it refuses a second resource with the same name.
#[derive(Debug, Default)]
pub struct RecordingClusterApi {
    submitted: Mutex<Vec<ClusterDescriptor>>,
    rejection: Mutex<Option<(u16, String)>>,
}

impl RecordingClusterApi {
    pub fn reject_with(&self, status: u16, message: &str) {
        *self.rejection.lock().unwrap() = Some((status, message.to_string()));
    }

    pub fn submitted(&self) -> Vec<ClusterDescriptor> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClusterApi for RecordingClusterApi {
    async fn submit(&self, descriptor: &ClusterDescriptor) -> Result<(), SpecError> {
        if let Some((status, message)) = self.rejection.lock().unwrap().clone() {
            return Err(SpecError::Rejected {
                name: descriptor.resource_name(),
                status,
                message,
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        let name = descriptor.resource_name();
        if submitted.iter().any(|d| d.resource_name() == name) {
            return Err(SpecError::Rejected {
                name: name.clone(),
                status: 409,
                message: format!("clusters \"{name}\" already exists"),
            });
        }
        submitted.push(descriptor.clone());
        Ok(())
    }
}

/// Orchestrator plus handles on every collaborator it was built with
pub struct TestHarness {
    pub sona: MockSonaClient,
    pub hosts: Arc<HostAllocator>,
    pub ips: Arc<IpAllocator>,
    pub store: Arc<InMemoryStore>,
    pub cluster_api: Arc<RecordingClusterApi>,
    pub orchestrator: Arc<Orchestrator>,
}

/// Harness with three 8-vCPU hosts, the default pools and a fixed MAC source
pub fn create_test_harness() -> TestHarness {
    create_test_harness_with(
        create_test_hosts(3, 8),
        IpAllocator::new(
            "10.10.1.3-10.10.1.254".parse().unwrap(),
            "192.168.0.2-192.168.0.254".parse().unwrap(),
        ),
        Duration::from_secs(5),
    )
}

pub fn create_test_harness_with(
    hosts: Vec<HostCapacity>,
    ips: IpAllocator,
    remote_timeout: Duration,
) -> TestHarness {
    let sona = MockSonaClient::new();
    let hosts = Arc::new(HostAllocator::new(hosts).unwrap());
    let ips = Arc::new(ips);
    let store = Arc::new(InMemoryStore::new());
    let cluster_api = Arc::new(RecordingClusterApi::default());

    let orchestrator = Orchestrator::new(
        Arc::new(sona.clone()),
        hosts.clone(),
        ips.clone(),
        store.clone(),
        cluster_api.clone(),
    )
    .with_mac_generator(MacGenerator::new(StepRng::new(0x10, 1)))
    .with_remote_timeout(remote_timeout);

    TestHarness {
        sona,
        hosts,
        ips,
        store,
        cluster_api,
        orchestrator: Arc::new(orchestrator),
    }
}
