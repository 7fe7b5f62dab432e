//! Onboarding orchestrator
//!
//! Runs one onboarding as a strictly sequential workflow:
//!
//! 1. network → 2. subnet → 3. port against the network controller,
//! 4. host placement, 5. workload and bootstrap addresses,
//! 6. cluster descriptor build and render, 7. cluster submission.
//!
//! Each provisioning step persists its local record before the remote
//! create. Any failure halts the workflow; nothing is rolled back. The
//! error carries the failed step and every resource committed so far so an
//! operator or reconciler can clean up. [`Orchestrator::release`] drops the
//! local records and allocations of a cluster so it can be onboarded again.
//!
//! Every remote boundary runs under a deadline, and cancellation is checked
//! before each remote call, never during one.

use crate::error::{
    OnboardingError, OnboardingStep, OrphanedResource, ResourceKind, ResourceState,
};
use crate::mac::MacGenerator;
use crate::model::{CatalogIntent, NetworkResource, PortResource, SubnetResource};
use crate::store::{ClusterResources, ResourceStore, StoreError};
use chrono::Utc;
use cluster_spec::{ClusterApi, ClusterDescriptor, SpecError};
use resource_pools::{HostAllocation, HostAssignment, IpAllocation, PoolError, ResourceRequest};
use serde::Serialize;
use sona_client::{NetworkProvisioner, ProvisionResponse, SonaError};
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Default deadline for a single remote call
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed network and cluster parameters applied to every onboarding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingPolicy {
    pub segment_id: u32,
    pub subnet_cidr: String,
    pub subnet_start: String,
    pub subnet_end: String,
    pub gateway: String,
    /// Fixed address given to the cluster's port
    pub port_ip: String,
    pub cluster_name: String,
    pub pod_cidr: String,
    pub service_cidr: String,
    pub service_domain: String,
}

impl Default for OnboardingPolicy {
    fn default() -> Self {
        Self {
            segment_id: 1,
            subnet_cidr: "10.10.1.0/24".to_string(),
            subnet_start: "10.10.1.2".to_string(),
            subnet_end: "10.10.1.255".to_string(),
            gateway: "10.10.1.1".to_string(),
            port_ip: "10.10.1.2".to_string(),
            cluster_name: "mectb".to_string(),
            pod_cidr: "10.10.0.0/16".to_string(),
            service_cidr: "20.20.0.0/24".to_string(),
            service_domain: "mectb.io".to_string(),
        }
    }
}

/// Everything a successful onboarding produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingOutcome {
    pub descriptor: ClusterDescriptor,
    /// Rendered submission document
    pub document: String,
    pub network: NetworkResource,
    pub subnet: SubnetResource,
    pub port: PortResource,
    pub host: HostAssignment,
    pub workload_ip: Ipv4Addr,
    pub bootstrap_ip: Ipv4Addr,
}

/// Local state dropped by [`Orchestrator::release`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasedCluster {
    pub cluster_id: String,
    pub resources: Option<ClusterResources>,
    pub host: Option<HostAssignment>,
    pub addresses: Vec<Ipv4Addr>,
}

impl ReleasedCluster {
    pub fn is_empty(&self) -> bool {
        self.resources.is_none() && self.host.is_none() && self.addresses.is_empty()
    }
}

/// Resources committed so far by one workflow
#[derive(Debug, Default)]
struct Ledger {
    entries: Vec<OrphanedResource>,
}

impl Ledger {
    fn record(&mut self, kind: ResourceKind, id: &str, state: ResourceState) {
        self.entries.push(OrphanedResource {
            kind,
            id: id.to_string(),
            state,
        });
    }

    /// Update the state of the most recently recorded resource
    fn settle(&mut self, state: ResourceState) {
        if let Some(last) = self.entries.last_mut() {
            last.state = state;
        }
    }

    fn snapshot(&self) -> Vec<OrphanedResource> {
        self.entries.clone()
    }
}

/// Drives the onboarding workflow against injected collaborators
pub struct Orchestrator {
    provisioner: Arc<dyn NetworkProvisioner>,
    hosts: Arc<dyn HostAllocation>,
    addresses: Arc<dyn IpAllocation>,
    store: Arc<dyn ResourceStore>,
    cluster_api: Arc<dyn ClusterApi>,
    macs: MacGenerator,
    policy: OnboardingPolicy,
    remote_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        provisioner: Arc<dyn NetworkProvisioner>,
        hosts: Arc<dyn HostAllocation>,
        addresses: Arc<dyn IpAllocation>,
        store: Arc<dyn ResourceStore>,
        cluster_api: Arc<dyn ClusterApi>,
    ) -> Self {
        Self {
            provisioner,
            hosts,
            addresses,
            store,
            cluster_api,
            macs: MacGenerator::from_entropy(),
            policy: OnboardingPolicy::default(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub fn with_mac_generator(mut self, macs: MacGenerator) -> Self {
        self.macs = macs;
        self
    }

    pub fn with_remote_timeout(mut self, remote_timeout: Duration) -> Self {
        self.remote_timeout = remote_timeout;
        self
    }

    /// Run the full workflow for `intent`.
    ///
    /// Returns on the first failing step. `cancel` is checked before every
    /// remote call; a call already in flight is allowed to finish.
    #[instrument(name = "onboard", skip_all, fields(cluster_id = %intent.cluster_id))]
    pub async fn onboard(
        &self,
        intent: &CatalogIntent,
        cancel: &CancellationToken,
    ) -> Result<OnboardingOutcome, OnboardingError> {
        intent
            .validate()
            .map_err(|errors| OnboardingError::Validation { errors })?;

        if let Some(existing) = self
            .store
            .network_for_cluster(&intent.cluster_id)
            .await
            .map_err(|source| OnboardingError::Store {
                step: OnboardingStep::CreateNetwork,
                source,
                orphaned: Vec::new(),
            })?
        {
            return Err(OnboardingError::Precondition {
                step: OnboardingStep::CreateNetwork,
                reason: format!(
                    "cluster {} already has network {}",
                    intent.cluster_id, existing.network_id
                ),
            });
        }

        info!("Starting onboarding");
        let mut ledger = Ledger::default();

        let network = self.create_network(intent, cancel, &mut ledger).await?;
        let subnet = self.create_subnet(&network, cancel, &mut ledger).await?;
        let port = self.create_port(&subnet, cancel, &mut ledger).await?;
        let host = self.allocate_host(intent, cancel, &mut ledger).await?;
        let (workload_ip, bootstrap_ip) =
            self.allocate_addresses(&port, cancel, &mut ledger).await?;
        let (descriptor, document) = self.build_cluster_spec(intent, &ledger)?;
        self.submit_cluster(&descriptor, cancel, &mut ledger).await?;

        info!(
            "Onboarding complete: network {}, host {}, workload IP {}, bootstrap IP {}",
            network.network_id, host.host_ip, workload_ip, bootstrap_ip
        );

        Ok(OnboardingOutcome {
            descriptor,
            document,
            network,
            subnet,
            port,
            host,
            workload_ip,
            bootstrap_ip,
        })
    }

    /// Drop a cluster's local records, host placement and port addresses.
    ///
    /// Remote network controller state is not touched; resources reported as
    /// provisioned must be removed there separately.
    #[instrument(skip(self))]
    pub async fn release(&self, cluster_id: &str) -> Result<ReleasedCluster, StoreError> {
        let resources = self.store.remove_cluster(cluster_id).await?;

        let mut addresses = Vec::new();
        if let Some(resources) = &resources {
            for port in &resources.ports {
                addresses.extend(self.addresses.release(&port.port_id).await);
            }
        }
        let host = self.hosts.release(cluster_id).await;

        let released = ReleasedCluster {
            cluster_id: cluster_id.to_string(),
            resources,
            host,
            addresses,
        };
        if released.is_empty() {
            info!("Nothing to release for cluster {}", cluster_id);
        } else {
            info!(
                "Released cluster {}: network {:?}, host {:?}, addresses {:?}",
                cluster_id,
                released.resources.as_ref().map(|r| &r.network.network_id),
                released.host.as_ref().map(|h| h.host_ip),
                released.addresses
            );
        }
        Ok(released)
    }

    async fn create_network(
        &self,
        intent: &CatalogIntent,
        cancel: &CancellationToken,
        ledger: &mut Ledger,
    ) -> Result<NetworkResource, OnboardingError> {
        let step = OnboardingStep::CreateNetwork;
        ensure_active(step, cancel, ledger)?;

        let network = NetworkResource {
            cluster_id: intent.cluster_id.clone(),
            network_id: Uuid::new_v4().to_string(),
            segment_id: self.policy.segment_id,
            tenant_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        };
        info!(
            "Creating network {} (tenant {})",
            network.network_id, network.tenant_id
        );

        self.store
            .insert_network(network.clone())
            .await
            .map_err(|source| match source {
                StoreError::DuplicateNetwork { network_id, .. } => OnboardingError::Precondition {
                    step,
                    reason: format!(
                        "cluster {} already has network {}",
                        intent.cluster_id, network_id
                    ),
                },
                source => store_failure(step, source, ledger),
            })?;
        ledger.record(ResourceKind::Network, &network.network_id, ResourceState::Recorded);

        ensure_active(step, cancel, ledger)?;
        let request = network.to_request();
        self.provision(step, self.provisioner.create_network(&request), ledger)
            .await?;
        Ok(network)
    }

    async fn create_subnet(
        &self,
        network: &NetworkResource,
        cancel: &CancellationToken,
        ledger: &mut Ledger,
    ) -> Result<SubnetResource, OnboardingError> {
        let step = OnboardingStep::CreateSubnet;
        ensure_active(step, cancel, ledger)?;

        let subnet = SubnetResource {
            network_id: network.network_id.clone(),
            subnet_id: Uuid::new_v4().to_string(),
            tenant_id: network.tenant_id.clone(),
            cidr: self.policy.subnet_cidr.clone(),
            start_ip: self.policy.subnet_start.clone(),
            end_ip: self.policy.subnet_end.clone(),
            gateway: self.policy.gateway.clone(),
            created_at: Utc::now(),
        };
        info!("Creating subnet {} ({})", subnet.subnet_id, subnet.cidr);

        self.store
            .insert_subnet(subnet.clone())
            .await
            .map_err(|source| store_failure(step, source, ledger))?;
        ledger.record(ResourceKind::Subnet, &subnet.subnet_id, ResourceState::Recorded);

        ensure_active(step, cancel, ledger)?;
        let request = subnet.to_request();
        self.provision(step, self.provisioner.create_subnet(&request), ledger)
            .await?;
        Ok(subnet)
    }

    async fn create_port(
        &self,
        subnet: &SubnetResource,
        cancel: &CancellationToken,
        ledger: &mut Ledger,
    ) -> Result<PortResource, OnboardingError> {
        let step = OnboardingStep::CreatePort;
        ensure_active(step, cancel, ledger)?;

        let port = PortResource {
            port_id: Uuid::new_v4().to_string(),
            subnet_id: subnet.subnet_id.clone(),
            network_id: subnet.network_id.clone(),
            tenant_id: subnet.tenant_id.clone(),
            ip_address: self.policy.port_ip.clone(),
            mac_address: self.macs.next_mac(),
            created_at: Utc::now(),
        };
        info!(
            "Creating port {} ({} / {})",
            port.port_id, port.ip_address, port.mac_address
        );

        self.store
            .insert_port(port.clone())
            .await
            .map_err(|source| store_failure(step, source, ledger))?;
        ledger.record(ResourceKind::Port, &port.port_id, ResourceState::Recorded);

        ensure_active(step, cancel, ledger)?;
        let request = port.to_request();
        self.provision(step, self.provisioner.create_port(&request), ledger)
            .await?;
        Ok(port)
    }

    async fn allocate_host(
        &self,
        intent: &CatalogIntent,
        cancel: &CancellationToken,
        ledger: &mut Ledger,
    ) -> Result<HostAssignment, OnboardingError> {
        let step = OnboardingStep::AllocateHost;
        ensure_active(step, cancel, ledger)?;

        let request = ResourceRequest::new(intent.vcpus, intent.memory, intent.storage);
        info!("Allocating host for {}", request);
        let host = self
            .allocate_within_deadline(
                step,
                ResourceKind::HostAssignment,
                &intent.cluster_id,
                self.hosts.allocate(&intent.cluster_id, request),
                ledger,
            )
            .await?;
        info!("Placed on host {}", host.host_ip);
        Ok(host)
    }

    async fn allocate_addresses(
        &self,
        port: &PortResource,
        cancel: &CancellationToken,
        ledger: &mut Ledger,
    ) -> Result<(Ipv4Addr, Ipv4Addr), OnboardingError> {
        let step = OnboardingStep::AllocateIp;
        ensure_active(step, cancel, ledger)?;

        let workload_ip = self
            .allocate_within_deadline(
                step,
                ResourceKind::WorkloadIp,
                &port.port_id,
                self.addresses.allocate_ip(&port.port_id),
                ledger,
            )
            .await?;

        ensure_active(step, cancel, ledger)?;
        let bootstrap_ip = self
            .allocate_within_deadline(
                step,
                ResourceKind::BootstrapIp,
                &port.port_id,
                self.addresses.bootstrap_ip(&port.port_id),
                ledger,
            )
            .await?;

        info!(
            "Port {} addresses: workload {}, bootstrap {}",
            port.port_id, workload_ip, bootstrap_ip
        );
        Ok((workload_ip, bootstrap_ip))
    }

    fn build_cluster_spec(
        &self,
        intent: &CatalogIntent,
        ledger: &Ledger,
    ) -> Result<(ClusterDescriptor, String), OnboardingError> {
        let step = OnboardingStep::BuildClusterSpec;
        let spec_failure = |source: SpecError| {
            error!("Step {} failed: {}", step, source);
            OnboardingError::ClusterSpec {
                step,
                source,
                orphaned: ledger.snapshot(),
            }
        };

        let descriptor = ClusterDescriptor::builder()
            .with_cluster_name(&self.policy.cluster_name)
            .with_cluster_id(&intent.cluster_id)
            .with_pod_cidr(&self.policy.pod_cidr)
            .with_service_cidr(&self.policy.service_cidr)
            .with_service_domain(&self.policy.service_domain)
            .with_kube_version(&intent.k8s_version)
            .with_os_distro(&intent.os_image)
            .build()
            .map_err(spec_failure)?;
        let document = descriptor.render().map_err(spec_failure)?;

        info!("Built cluster spec {}", descriptor.resource_name());
        Ok((descriptor, document))
    }

    async fn submit_cluster(
        &self,
        descriptor: &ClusterDescriptor,
        cancel: &CancellationToken,
        ledger: &mut Ledger,
    ) -> Result<(), OnboardingError> {
        let step = OnboardingStep::SubmitCluster;
        ensure_active(step, cancel, ledger)?;

        let result = self
            .within_deadline(step, self.cluster_api.submit(descriptor), ledger)
            .await?;
        match result {
            Ok(()) => Ok(()),
            Err(SpecError::Rejected { status, message, .. }) => {
                error!("Step {} rejected: {} - {}", step, status, message);
                Err(OnboardingError::RemoteProvisioning {
                    step,
                    status,
                    body: message,
                    orphaned: ledger.snapshot(),
                })
            }
            Err(SpecError::Kube(e)) => {
                error!("Step {} failed: {}", step, e);
                Err(OnboardingError::Transport {
                    step,
                    message: e.to_string(),
                    orphaned: ledger.snapshot(),
                })
            }
            Err(source) => Err(OnboardingError::ClusterSpec {
                step,
                source,
                orphaned: ledger.snapshot(),
            }),
        }
    }

    /// One remote create call: success only on 201, never retried
    async fn provision<F>(
        &self,
        step: OnboardingStep,
        call: F,
        ledger: &mut Ledger,
    ) -> Result<(), OnboardingError>
    where
        F: Future<Output = Result<ProvisionResponse, SonaError>>,
    {
        let outcome = match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(self.timed_out(step, ledger)),
        };

        match outcome {
            Ok(response) if response.is_success() => {
                ledger.settle(ResourceState::Provisioned);
                info!("Step {} succeeded ({})", step, response.status);
                Ok(())
            }
            Ok(response) => {
                ledger.settle(ResourceState::Rejected);
                error!(
                    "Step {} rejected: {} - {}",
                    step, response.status, response.body
                );
                Err(OnboardingError::RemoteProvisioning {
                    step,
                    status: response.status,
                    body: response.body,
                    orphaned: ledger.snapshot(),
                })
            }
            Err(SonaError::Timeout(_)) => Err(self.timed_out(step, ledger)),
            Err(e) => {
                ledger.settle(ResourceState::Unknown);
                error!("Step {} failed: {}", step, e);
                Err(OnboardingError::Transport {
                    step,
                    message: e.to_string(),
                    orphaned: ledger.snapshot(),
                })
            }
        }
    }

    /// Run an allocator call under the deadline. A call that timed out may
    /// still have committed, so it is recorded with an unknown state.
    async fn allocate_within_deadline<F, T>(
        &self,
        step: OnboardingStep,
        kind: ResourceKind,
        id: &str,
        call: F,
        ledger: &mut Ledger,
    ) -> Result<T, OnboardingError>
    where
        F: Future<Output = Result<T, PoolError>>,
    {
        match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(Ok(allocated)) => {
                ledger.record(kind, id, ResourceState::Allocated);
                Ok(allocated)
            }
            Ok(Err(source)) => Err(pool_failure(step, source, ledger)),
            Err(_) => {
                ledger.record(kind, id, ResourceState::Unknown);
                Err(self.timed_out(step, ledger))
            }
        }
    }

    /// Run a non-provisioning remote call under the deadline
    async fn within_deadline<F, T>(
        &self,
        step: OnboardingStep,
        call: F,
        ledger: &Ledger,
    ) -> Result<T, OnboardingError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.remote_timeout, call)
            .await
            .map_err(|_| {
                error!("Step {} timed out after {:?}", step, self.remote_timeout);
                OnboardingError::Timeout {
                    step,
                    after: self.remote_timeout,
                    orphaned: ledger.snapshot(),
                }
            })
    }

    fn timed_out(&self, step: OnboardingStep, ledger: &mut Ledger) -> OnboardingError {
        ledger.settle(ResourceState::Unknown);
        error!("Step {} timed out after {:?}", step, self.remote_timeout);
        OnboardingError::Timeout {
            step,
            after: self.remote_timeout,
            orphaned: ledger.snapshot(),
        }
    }
}

fn ensure_active(
    step: OnboardingStep,
    cancel: &CancellationToken,
    ledger: &Ledger,
) -> Result<(), OnboardingError> {
    if cancel.is_cancelled() {
        warn!("Onboarding cancelled before step {}", step);
        return Err(OnboardingError::Cancelled {
            step,
            orphaned: ledger.snapshot(),
        });
    }
    Ok(())
}

fn store_failure(step: OnboardingStep, source: StoreError, ledger: &Ledger) -> OnboardingError {
    error!("Step {} store failure: {}", step, source);
    OnboardingError::Store {
        step,
        source,
        orphaned: ledger.snapshot(),
    }
}

fn pool_failure(step: OnboardingStep, source: PoolError, ledger: &Ledger) -> OnboardingError {
    warn!("Step {} allocation failed: {}", step, source);
    let orphaned = ledger.snapshot();
    match source {
        PoolError::CapacityExhausted { .. } => OnboardingError::CapacityExhausted {
            step,
            source,
            orphaned,
        },
        PoolError::PoolExhausted { pool } => OnboardingError::PoolExhausted {
            step,
            pool,
            orphaned,
        },
        source => OnboardingError::Allocation {
            step,
            source,
            orphaned,
        },
    }
}
