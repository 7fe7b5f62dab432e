//! Unit tests for the onboarding orchestrator

#[cfg(test)]
mod tests {
    use crate::error::{OnboardingError, OnboardingStep, ResourceKind, ResourceState};
    use crate::orchestrator::Orchestrator;
    use crate::store::ResourceStore;
    use crate::test_utils::*;
    use resource_pools::{HostAllocation, HostAllocator, HostAssignment, IpAllocator, PoolError, ResourceRequest};
    use sona_client::{ProvisionCall, ProvisionOperation};
    use std::collections::HashSet;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_onboard_success_builds_mectb_descriptor() {
        let harness = create_test_harness();

        let outcome = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap();

        let descriptor = &outcome.descriptor;
        assert_eq!(descriptor.cluster_name(), "mectb");
        assert_eq!(descriptor.resource_name(), "mectb-c1");
        assert_eq!(descriptor.pod_cidr(), "10.10.0.0/16");
        assert_eq!(descriptor.service_cidr(), "20.20.0.0/24");
        assert_eq!(descriptor.service_domain(), "mectb.io");
        assert_eq!(descriptor.kube_version(), "1.28");
        assert_eq!(descriptor.os_distro(), "ubuntu-22");
        assert!(outcome.document.contains("kind: Cluster"));

        assert_eq!(outcome.host.host_ip, Ipv4Addr::new(10, 2, 1, 68));
        assert_eq!(outcome.workload_ip, Ipv4Addr::new(10, 10, 1, 3));
        assert_eq!(outcome.bootstrap_ip, Ipv4Addr::new(192, 168, 0, 2));
        assert_eq!(harness.cluster_api.submitted(), vec![outcome.descriptor.clone()]);
    }

    #[tokio::test]
    async fn test_network_subnet_port_created_in_order() {
        let harness = create_test_harness();

        let outcome = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            harness.sona.operations(),
            vec![
                ProvisionOperation::Network,
                ProvisionOperation::Subnet,
                ProvisionOperation::Port
            ]
        );

        let calls = harness.sona.calls();
        let ProvisionCall::Network(network) = &calls[0] else {
            panic!("expected network call first");
        };
        let ProvisionCall::Subnet(subnet) = &calls[1] else {
            panic!("expected subnet call second");
        };
        let ProvisionCall::Port(port) = &calls[2] else {
            panic!("expected port call third");
        };

        assert_eq!(network.network_id, outcome.network.network_id);
        assert_eq!(network.segment_id, 1);
        assert_eq!(subnet.network_id, network.network_id);
        assert_eq!(subnet.tenant_id, network.tenant_id);
        assert_eq!(subnet.cidr, "10.10.1.0/24");
        assert_eq!(subnet.start_ip, "10.10.1.2");
        assert_eq!(subnet.end_ip, "10.10.1.255");
        assert_eq!(subnet.gateway, "10.10.1.1");
        assert_eq!(port.subnet_id, subnet.subnet_id);
        assert_eq!(port.ip_address, "10.10.1.2");
        assert_eq!(port.mac_address, "00:16:3e:10:11:12");
    }

    #[tokio::test]
    async fn test_generated_identifiers_are_unique() {
        let harness = create_test_harness();
        let cancel = CancellationToken::new();

        let a = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &cancel)
            .await
            .unwrap();
        let b = harness
            .orchestrator
            .onboard(&create_test_intent("c2"), &cancel)
            .await
            .unwrap();

        let ids: HashSet<&str> = [
            a.network.network_id.as_str(),
            a.network.tenant_id.as_str(),
            a.subnet.subnet_id.as_str(),
            a.port.port_id.as_str(),
            b.network.network_id.as_str(),
            b.network.tenant_id.as_str(),
            b.subnet.subnet_id.as_str(),
            b.port.port_id.as_str(),
        ]
        .into_iter()
        .collect();
        assert_eq!(ids.len(), 8);
        assert_eq!(b.port.mac_address, "00:16:3e:13:14:15");
    }

    #[tokio::test]
    async fn test_network_rejection_stops_before_subnet() {
        let harness = create_test_harness();
        harness
            .sona
            .respond_with(ProvisionOperation::Network, 500, "internal error");

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            OnboardingError::RemoteProvisioning {
                step, status, body, orphaned,
            } => {
                assert_eq!(*step, OnboardingStep::CreateNetwork);
                assert_eq!(*status, 500);
                assert_eq!(body, "internal error");
                assert_eq!(orphaned.len(), 1);
                assert_eq!(orphaned[0].kind, ResourceKind::Network);
                assert_eq!(orphaned[0].state, ResourceState::Rejected);
            }
            other => panic!("expected remote provisioning error, got {other:?}"),
        }
        assert_eq!(harness.sona.operations(), vec![ProvisionOperation::Network]);

        let resources = harness.store.cluster_resources("c1").await.unwrap().unwrap();
        assert!(resources.subnets.is_empty());
        assert!(resources.ports.is_empty());
        assert!(harness.hosts.host_ip("c1").is_err());
    }

    #[tokio::test]
    async fn test_subnet_rejection_skips_port() {
        let harness = create_test_harness();
        harness
            .sona
            .respond_with(ProvisionOperation::Subnet, 409, "{\"error\":\"conflict\"}");

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(OnboardingStep::CreateSubnet));
        assert!(!err.is_retryable());
        assert_eq!(
            harness.sona.operations(),
            vec![ProvisionOperation::Network, ProvisionOperation::Subnet]
        );

        let states: Vec<(ResourceKind, ResourceState)> =
            err.orphaned().iter().map(|o| (o.kind, o.state)).collect();
        assert_eq!(
            states,
            vec![
                (ResourceKind::Network, ResourceState::Provisioned),
                (ResourceKind::Subnet, ResourceState::Rejected),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_cluster_is_precondition_failure() {
        let harness = create_test_harness();
        let cancel = CancellationToken::new();
        harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &cancel)
            .await
            .unwrap();

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::Precondition {
                step: OnboardingStep::CreateNetwork,
                ..
            }
        ));
        assert!(err.orphaned().is_empty());
        assert_eq!(harness.sona.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_intent_mutates_nothing() {
        let harness = create_test_harness();
        let mut intent = create_test_intent("c1");
        intent.vcpus = 0;
        intent.k8s_version = String::new();

        let err = harness
            .orchestrator
            .onboard(&intent, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            OnboardingError::Validation { errors } => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["vcpus", "k8sVersion"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(harness.sona.calls().is_empty());
        assert!(harness.store.network_for_cluster("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slow_port_call_times_out() {
        let harness = create_test_harness_with(
            create_test_hosts(3, 8),
            IpAllocator::new(
                "10.10.1.3-10.10.1.254".parse().unwrap(),
                "192.168.0.2-192.168.0.254".parse().unwrap(),
            ),
            Duration::from_millis(50),
        );
        harness
            .sona
            .delay(ProvisionOperation::Port, Duration::from_millis(500));

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            OnboardingError::Timeout { step, after, orphaned } => {
                assert_eq!(*step, OnboardingStep::CreatePort);
                assert_eq!(*after, Duration::from_millis(50));
                let port = orphaned.last().unwrap();
                assert_eq!(port.kind, ResourceKind::Port);
                assert_eq!(port.state, ResourceState::Unknown);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(err.is_retryable());
        assert!(harness.hosts.host_ip("c1").is_err());
    }

    #[tokio::test]
    async fn test_transport_failure_reports_unknown_remote_state() {
        let harness = create_test_harness();
        harness
            .sona
            .fail_with(ProvisionOperation::Network, "connection refused");

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            OnboardingError::Transport { step, message, orphaned } => {
                assert_eq!(*step, OnboardingStep::CreateNetwork);
                assert!(message.contains("connection refused"));
                assert_eq!(orphaned[0].state, ResourceState::Unknown);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start_does_nothing() {
        let harness = create_test_harness();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::Cancelled {
                step: OnboardingStep::CreateNetwork,
                ..
            }
        ));
        assert!(harness.sona.calls().is_empty());
        assert!(harness.store.network_for_cluster("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_during_call_stops_at_next_step() {
        let harness = create_test_harness();
        harness
            .sona
            .delay(ProvisionOperation::Subnet, Duration::from_millis(200));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(OnboardingStep::CreatePort));
        assert!(matches!(err, OnboardingError::Cancelled { .. }));
        assert_eq!(
            harness.sona.operations(),
            vec![ProvisionOperation::Network, ProvisionOperation::Subnet]
        );
        assert!(err
            .orphaned()
            .iter()
            .all(|o| o.state == ResourceState::Provisioned));
    }

    #[tokio::test]
    async fn test_capacity_exhausted_after_port() {
        let harness = create_test_harness_with(
            create_test_hosts(2, 1),
            IpAllocator::new(
                "10.10.1.3-10.10.1.254".parse().unwrap(),
                "192.168.0.2-192.168.0.254".parse().unwrap(),
            ),
            Duration::from_secs(5),
        );

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::CapacityExhausted {
                step: OnboardingStep::AllocateHost,
                ..
            }
        ));
        assert!(err.is_retryable());
        let kinds: Vec<ResourceKind> = err.orphaned().iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![ResourceKind::Network, ResourceKind::Subnet, ResourceKind::Port]
        );
    }

    #[tokio::test]
    async fn test_pool_exhausted_is_distinct() {
        let harness = create_test_harness_with(
            create_test_hosts(3, 8),
            IpAllocator::new(
                "10.10.1.3-10.10.1.3".parse().unwrap(),
                "192.168.0.2-192.168.0.254".parse().unwrap(),
            ),
            Duration::from_secs(5),
        );
        let cancel = CancellationToken::new();
        harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &cancel)
            .await
            .unwrap();

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c2"), &cancel)
            .await
            .unwrap_err();

        match &err {
            OnboardingError::PoolExhausted { step, pool, orphaned } => {
                assert_eq!(*step, OnboardingStep::AllocateIp);
                assert_eq!(pool, "workload");
                assert_eq!(orphaned.last().unwrap().kind, ResourceKind::HostAssignment);
            }
            other => panic!("expected pool exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_rejection_is_remote_error() {
        let harness = create_test_harness();
        harness.cluster_api.reject_with(422, "spec.clusterNetwork invalid");

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            OnboardingError::RemoteProvisioning { step, status, body, orphaned } => {
                assert_eq!(*step, OnboardingStep::SubmitCluster);
                assert_eq!(*status, 422);
                assert_eq!(body, "spec.clusterNetwork invalid");
                assert_eq!(orphaned.len(), 6);
            }
            other => panic!("expected remote provisioning error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_host_requery_returns_original_placement() {
        let harness = create_test_harness();

        let outcome = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            harness.hosts.host_ip("c1").unwrap(),
            outcome.host.host_ip
        );
    }

    #[tokio::test]
    async fn test_concurrent_onboardings_get_disjoint_hosts_and_addresses() {
        let harness = create_test_harness_with(
            create_test_hosts(4, 2),
            IpAllocator::new(
                "10.10.1.3-10.10.1.254".parse().unwrap(),
                "192.168.0.2-192.168.0.254".parse().unwrap(),
            ),
            Duration::from_secs(5),
        );

        let mut tasks = Vec::new();
        for i in 0..4 {
            let orchestrator = Arc::clone(&harness.orchestrator);
            tasks.push(tokio::spawn(async move {
                orchestrator
                    .onboard(&create_test_intent(&format!("c{i}")), &CancellationToken::new())
                    .await
            }));
        }

        let mut hosts = HashSet::new();
        let mut workload = HashSet::new();
        let mut bootstrap = HashSet::new();
        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            hosts.insert(outcome.host.host_ip);
            workload.insert(outcome.workload_ip);
            bootstrap.insert(outcome.bootstrap_ip);
        }
        assert_eq!(hosts.len(), 4);
        assert_eq!(workload.len(), 4);
        assert_eq!(bootstrap.len(), 4);
        assert_eq!(harness.sona.calls().len(), 12);
    }

    #[tokio::test]
    async fn test_retry_after_release_succeeds() {
        let harness = create_test_harness();
        harness
            .sona
            .respond_with(ProvisionOperation::Network, 503, "busy");
        let intent = create_test_intent("c1");

        let err = harness
            .orchestrator
            .onboard(&intent, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let blocked = harness
            .orchestrator
            .onboard(&intent, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(blocked, OnboardingError::Precondition { .. }));

        let released = harness.orchestrator.release("c1").await.unwrap();
        let network = released.resources.as_ref().unwrap();
        assert_eq!(network.network.network_id, err.orphaned()[0].id);
        assert!(released.host.is_none());

        harness
            .sona
            .respond_with(ProvisionOperation::Network, 201, "");
        let outcome = harness
            .orchestrator
            .onboard(&intent, &CancellationToken::new())
            .await
            .unwrap();
        assert_ne!(outcome.network.network_id, network.network.network_id);
    }

    #[tokio::test]
    async fn test_release_returns_host_and_addresses() {
        let harness = create_test_harness_with(
            create_test_hosts(1, 2),
            IpAllocator::new(
                "10.10.1.3-10.10.1.3".parse().unwrap(),
                "192.168.0.2-192.168.0.2".parse().unwrap(),
            ),
            Duration::from_secs(5),
        );
        harness.cluster_api.reject_with(500, "apiserver unavailable");

        let err = harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(OnboardingStep::SubmitCluster));

        let released = harness.orchestrator.release("c1").await.unwrap();
        assert_eq!(released.host.unwrap().host_ip, Ipv4Addr::new(10, 2, 1, 68));
        assert_eq!(
            released.addresses,
            vec![Ipv4Addr::new(10, 10, 1, 3), Ipv4Addr::new(192, 168, 0, 2)]
        );
        assert_eq!(harness.ips.workload_pool().available(), 1);
        assert!(harness.orchestrator.release("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clusters_submit_under_distinct_names() {
        let harness = create_test_harness();
        let cancel = CancellationToken::new();

        harness
            .orchestrator
            .onboard(&create_test_intent("c1"), &cancel)
            .await
            .unwrap();
        harness
            .orchestrator
            .onboard(&create_test_intent("c2"), &cancel)
            .await
            .unwrap();

        let names: Vec<String> = harness
            .cluster_api
            .submitted()
            .iter()
            .map(|d| d.resource_name())
            .collect();
        assert_eq!(names, vec!["mectb-c1", "mectb-c2"]);
    }

    /// Host allocator that commits the placement only after a delay
    struct SlowHostAllocation {
        inner: HostAllocator,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl HostAllocation for SlowHostAllocation {
        async fn allocate(
            &self,
            cluster_id: &str,
            request: ResourceRequest,
        ) -> Result<HostAssignment, PoolError> {
            tokio::time::sleep(self.delay).await;
            self.inner.allocate(cluster_id, request)
        }

        async fn host_ip(&self, cluster_id: &str) -> Result<Ipv4Addr, PoolError> {
            self.inner.host_ip(cluster_id)
        }

        async fn release(&self, cluster_id: &str) -> Option<HostAssignment> {
            self.inner.release(cluster_id)
        }
    }

    #[tokio::test]
    async fn test_slow_host_allocation_reports_unknown_placement() {
        let sona = sona_client::MockSonaClient::new();
        let orchestrator = Orchestrator::new(
            Arc::new(sona),
            Arc::new(SlowHostAllocation {
                inner: HostAllocator::new(create_test_hosts(1, 8)).unwrap(),
                delay: Duration::from_millis(500),
            }),
            Arc::new(IpAllocator::new(
                "10.10.1.3-10.10.1.254".parse().unwrap(),
                "192.168.0.2-192.168.0.254".parse().unwrap(),
            )),
            Arc::new(crate::store::InMemoryStore::new()),
            Arc::new(RecordingClusterApi::default()),
        )
        .with_remote_timeout(Duration::from_millis(50));

        let err = orchestrator
            .onboard(&create_test_intent("c1"), &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            OnboardingError::Timeout { step, orphaned, .. } => {
                assert_eq!(*step, OnboardingStep::AllocateHost);
                let host = orphaned.last().unwrap();
                assert_eq!(host.kind, ResourceKind::HostAssignment);
                assert_eq!(host.id, "c1");
                assert_eq!(host.state, ResourceState::Unknown);
                assert_eq!(orphaned[2].state, ResourceState::Provisioned);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
