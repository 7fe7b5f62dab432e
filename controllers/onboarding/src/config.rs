//! Controller configuration from environment variables

use crate::deploy::{ChartCatalog, DEFAULT_CHART};
use crate::error::ControllerError;
use resource_pools::{AddressRange, HostCapacity};
use std::collections::HashMap;
use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const CHART_PREFIX: &str = "CHART_";

#[derive(Debug, Clone)]
pub struct Config {
    pub sona_url: String,
    pub sona_username: String,
    pub sona_password: String,
    pub hosts: Vec<HostCapacity>,
    pub workload_pool: AddressRange,
    pub bootstrap_pool: AddressRange,
    pub listen_addr: SocketAddr,
    pub remote_timeout: Duration,
    pub deploy_timeout: Duration,
    pub submit_clusters: bool,
    pub cluster_namespace: String,
    pub charts: ChartCatalog,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Load configuration from an explicit variable map
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ControllerError> {
        let get = |key: &str, default: &str| -> String {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let default_vcpus: u32 = parse_var("HOST_VCPUS", &get("HOST_VCPUS", "32"))?;
        let default_memory: u64 = parse_var("HOST_MEMORY_MB", &get("HOST_MEMORY_MB", "65536"))?;
        let default_storage: u64 = parse_var("HOST_STORAGE_GB", &get("HOST_STORAGE_GB", "1000"))?;
        let hosts = parse_hosts(
            &get("EDGETRON_HOSTS", "10.2.1.68,10.2.1.69,10.2.1.70"),
            default_vcpus,
            default_memory,
            default_storage,
        )?;

        let charts = vars
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(CHART_PREFIX)
                    .filter(|id| !id.is_empty())
                    .map(|id| (id.to_string(), value.trim().to_string()))
            })
            .collect();

        Ok(Self {
            sona_url: get("SONA_URL", "http://10.2.1.33:8181"),
            sona_username: get("SONA_USERNAME", "onos"),
            sona_password: get("SONA_PASSWORD", "rocks"),
            hosts,
            workload_pool: parse_var("WORKLOAD_POOL", &get("WORKLOAD_POOL", "10.10.1.3-10.10.1.254"))?,
            bootstrap_pool: parse_var(
                "BOOTSTRAP_POOL",
                &get("BOOTSTRAP_POOL", "192.168.0.2-192.168.0.254"),
            )?,
            listen_addr: parse_var("LISTEN_ADDR", &get("LISTEN_ADDR", "0.0.0.0:8000"))?,
            remote_timeout: Duration::from_secs(parse_var(
                "REMOTE_TIMEOUT_SECS",
                &get("REMOTE_TIMEOUT_SECS", "30"),
            )?),
            deploy_timeout: Duration::from_secs(parse_var(
                "DEPLOY_TIMEOUT_SECS",
                &get("DEPLOY_TIMEOUT_SECS", "300"),
            )?),
            submit_clusters: parse_var("SUBMIT_CLUSTERS", &get("SUBMIT_CLUSTERS", "false"))?,
            cluster_namespace: get("CLUSTER_NAMESPACE", "default"),
            charts: ChartCatalog::new(get("DEFAULT_CHART", DEFAULT_CHART), charts),
        })
    }

    pub fn log_summary(&self) {
        info!("Configuration:");
        info!("  SONA URL: {}", self.sona_url);
        info!(
            "  Hosts: {}",
            self.hosts
                .iter()
                .map(|h| h.host_ip.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        info!("  Workload pool: {}", self.workload_pool);
        info!("  Bootstrap pool: {}", self.bootstrap_pool);
        info!("  Listen address: {}", self.listen_addr);
        info!("  Remote timeout: {:?}", self.remote_timeout);
        info!(
            "  Cluster submission: {}",
            if self.submit_clusters {
                format!("namespace {}", self.cluster_namespace)
            } else {
                "log only".to_string()
            }
        );
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ControllerError::InvalidConfig(format!("{key}={value:?}: {e}")))
}

/// Parses `ip` or `ip:vcpus:memory:storage` entries, comma separated
fn parse_hosts(
    value: &str,
    vcpus: u32,
    memory: u64,
    storage: u64,
) -> Result<Vec<HostCapacity>, ControllerError> {
    let hosts = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            match parts.as_slice() {
                [ip] => Ok(HostCapacity::new(
                    parse_var::<Ipv4Addr>("EDGETRON_HOSTS", ip)?,
                    vcpus,
                    memory,
                    storage,
                )),
                [ip, cpu, mem, disk] => Ok(HostCapacity::new(
                    parse_var("EDGETRON_HOSTS", ip)?,
                    parse_var("EDGETRON_HOSTS", cpu)?,
                    parse_var("EDGETRON_HOSTS", mem)?,
                    parse_var("EDGETRON_HOSTS", disk)?,
                )),
                _ => Err(ControllerError::InvalidConfig(format!(
                    "EDGETRON_HOSTS entry {entry:?} must be ip or ip:vcpus:memory:storage"
                ))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    if hosts.is_empty() {
        return Err(ControllerError::InvalidConfig(
            "EDGETRON_HOSTS lists no hosts".to_string(),
        ));
    }
    Ok(hosts)
}
