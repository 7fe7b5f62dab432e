//! Application deployment onto onboarded clusters.
//!
//! A deployment runs `helm install` on the cluster's host over SSH. It is
//! spawned as its own task and reports back through a oneshot channel, so
//! the caller gets a result while a disconnecting client cannot interrupt
//! an install halfway.

use serde::Serialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Chart path used when a chart id has no explicit mapping
pub const DEFAULT_CHART: &str = "bitnami/nginx";

/// Release name given to every install
pub const DEFAULT_RELEASE: &str = "my-release";

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Deployment on {host} produced no output: {stderr}")]
    EmptyOutput { host: Ipv4Addr, stderr: String },

    #[error("Deployment on {host} timed out after {after:?}")]
    Timeout { host: Ipv4Addr, after: Duration },

    #[error("Deployment task ended without a result")]
    Aborted,
}

/// Captured output of a successful deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentReport {
    pub host_ip: Ipv4Addr,
    pub chart_path: String,
    pub stdout: String,
    pub stderr: String,
}

/// Maps chart ids to chart paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartCatalog {
    default_chart: String,
    charts: HashMap<String, String>,
}

impl Default for ChartCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_CHART, HashMap::new())
    }
}

impl ChartCatalog {
    pub fn new(default_chart: impl Into<String>, charts: HashMap<String, String>) -> Self {
        Self {
            default_chart: default_chart.into(),
            charts: charts
                .into_iter()
                .map(|(id, path)| (id.to_ascii_lowercase(), path))
                .collect(),
        }
    }

    /// Chart path for `chart_id` (ids match case-insensitively)
    pub fn chart_path(&self, chart_id: &str) -> &str {
        self.charts
            .get(&chart_id.to_ascii_lowercase())
            .map(String::as_str)
            .unwrap_or(&self.default_chart)
    }
}

/// Installs a chart on a host
#[async_trait::async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, host_ip: Ipv4Addr, chart_path: &str)
        -> Result<DeploymentReport, DeployError>;
}

/// Runs `<program> <host> "helm install <release> <chart>"`
#[derive(Debug, Clone)]
pub struct SshDeployer {
    program: String,
    release: String,
}

impl Default for SshDeployer {
    fn default() -> Self {
        Self::new("ssh")
    }
}

impl SshDeployer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            release: DEFAULT_RELEASE.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Deployer for SshDeployer {
    async fn deploy(
        &self,
        host_ip: Ipv4Addr,
        chart_path: &str,
    ) -> Result<DeploymentReport, DeployError> {
        let remote_command = format!("helm install {} {}", self.release, chart_path);
        info!("Deploying on {}: {}", host_ip, remote_command);

        let output = Command::new(&self.program)
            .arg(host_ip.to_string())
            .arg(&remote_command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DeployError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.trim().is_empty() {
            warn!("Deployment on {} stderr: {}", host_ip, stderr.trim());
        }

        // helm prints release notes on success; silence means it never ran
        if stdout.trim().is_empty() {
            error!("Deployment on {} produced no output ({})", host_ip, output.status);
            return Err(DeployError::EmptyOutput {
                host: host_ip,
                stderr,
            });
        }

        info!("Deployment on {} stdout: {}", host_ip, stdout.trim());
        Ok(DeploymentReport {
            host_ip,
            chart_path: chart_path.to_string(),
            stdout,
            stderr,
        })
    }
}

/// Pending result of a spawned deployment
#[derive(Debug)]
pub struct DeploymentHandle {
    result: oneshot::Receiver<Result<DeploymentReport, DeployError>>,
}

impl DeploymentHandle {
    /// Wait for the deployment task to finish
    pub async fn wait(self) -> Result<DeploymentReport, DeployError> {
        self.result.await.map_err(|_| DeployError::Aborted)?
    }
}

/// Run a deployment on its own task, bounded by `deadline`
pub fn spawn_deployment(
    deployer: Arc<dyn Deployer>,
    host_ip: Ipv4Addr,
    chart_path: String,
    deadline: Duration,
) -> DeploymentHandle {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let result =
            match tokio::time::timeout(deadline, deployer.deploy(host_ip, &chart_path)).await {
                Ok(result) => result,
                Err(_) => {
                    error!("Deployment on {} timed out after {:?}", host_ip, deadline);
                    Err(DeployError::Timeout {
                        host: host_ip,
                        after: deadline,
                    })
                }
            };

        if tx.send(result).is_err() {
            warn!("Deployment on {} finished after its caller went away", host_ip);
        }
    });

    DeploymentHandle { result: rx }
}
