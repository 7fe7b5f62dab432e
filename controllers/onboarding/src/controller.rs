//! Main controller implementation.
//!
//! Wires the SONA client, allocators, stores, cluster submission and the
//! deployer into the HTTP router, then serves until ctrl-c.

use crate::api::{AppState, router};
use crate::config::Config;
use crate::deploy::SshDeployer;
use crate::error::ControllerError;
use crate::orchestrator::Orchestrator;
use crate::store::InMemoryStore;
use axum::Router;
use cluster_spec::{ClusterApi, KubeClusterApi, LogOnlyClusterApi};
use kube::Client;
use resource_pools::{HostAllocator, IpAllocator};
use sona_client::SonaClient;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main controller for cluster onboarding.
pub struct Controller {
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
}

impl Controller {
    /// Creates a new controller instance and binds its listener.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing Onboarding Controller");

        let sona = SonaClient::new(
            config.sona_url.clone(),
            config.sona_username.clone(),
            config.sona_password.clone(),
            config.remote_timeout,
        )?;
        // Onboarding still starts without SONA; each request reports its own failure
        if let Err(e) = sona.validate_connectivity().await {
            warn!("SONA at {} is not reachable yet: {}", config.sona_url, e);
        }

        let hosts = Arc::new(HostAllocator::new(config.hosts.clone())?);
        let ips = Arc::new(IpAllocator::new(config.workload_pool, config.bootstrap_pool));
        let store = Arc::new(InMemoryStore::new());

        let cluster_api: Arc<dyn ClusterApi> = if config.submit_clusters {
            let kube_client = Client::try_default().await?;
            Arc::new(KubeClusterApi::new(kube_client, &config.cluster_namespace))
        } else {
            Arc::new(LogOnlyClusterApi)
        };

        let orchestrator = Orchestrator::new(
            Arc::new(sona),
            hosts.clone(),
            ips,
            store.clone(),
            cluster_api,
        )
        .with_remote_timeout(config.remote_timeout);

        let shutdown = CancellationToken::new();
        let state = AppState {
            catalogs: store.clone(),
            resources: store,
            hosts,
            orchestrator: Arc::new(orchestrator),
            deployer: Arc::new(SshDeployer::default()),
            charts: Arc::new(config.charts.clone()),
            deploy_timeout: config.deploy_timeout,
            shutdown: shutdown.clone(),
        };

        let listener = TcpListener::bind(config.listen_addr).await?;

        Ok(Self {
            listener,
            router: router(state),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ControllerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until ctrl-c, then cancels in-flight onboardings.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Onboarding Controller listening on {}", self.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal(
                tokio::signal::ctrl_c(),
                self.shutdown.clone(),
            ))
            .await?;

        info!("Onboarding Controller stopped");
        Ok(())
    }
}

/// Resolves once `signal` fires, cancelling `shutdown` first. If the signal
/// handler cannot be installed the server keeps running.
async fn shutdown_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for ctrl-c, graceful shutdown disabled: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    shutdown.cancel();
}
