//! Port-keyed IP address pools.
//!
//! Each pool hands out the lowest free address in its range. An address
//! stays mapped to its port until released and is never handed to a
//! second port while mapped.

use crate::error::PoolError;
use ipnetwork::Ipv4Network;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Pool name for workload subnet addresses
pub const WORKLOAD_POOL: &str = "workload";

/// Pool name for bootstrap network addresses
pub const BOOTSTRAP_POOL: &str = "bootstrap";

/// Inclusive IPv4 address range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    first: Ipv4Addr,
    last: Ipv4Addr,
}

impl AddressRange {
    /// Creates a range; `first` must not come after `last`.
    pub fn new(first: Ipv4Addr, last: Ipv4Addr) -> Result<Self, PoolError> {
        if u32::from(first) > u32::from(last) {
            return Err(PoolError::InvalidConfig(format!(
                "range start {first} is after range end {last}"
            )));
        }
        Ok(Self { first, last })
    }

    /// Usable host addresses of a network (network and broadcast excluded).
    pub fn from_network(network: Ipv4Network) -> Result<Self, PoolError> {
        if network.prefix() >= 31 {
            return Err(PoolError::InvalidConfig(format!(
                "network {network} has no usable host addresses"
            )));
        }
        let first = Ipv4Addr::from(u32::from(network.network()) + 1);
        let last = Ipv4Addr::from(u32::from(network.broadcast()) - 1);
        Self::new(first, last)
    }

    pub fn first(&self) -> Ipv4Addr {
        self.first
    }

    pub fn last(&self) -> Ipv4Addr {
        self.last
    }

    /// Number of addresses in the range
    pub fn size(&self) -> u64 {
        u64::from(u32::from(self.last) - u32::from(self.first)) + 1
    }

    fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        (u32::from(self.first)..=u32::from(self.last)).map(Ipv4Addr::from)
    }
}

impl FromStr for AddressRange {
    type Err = PoolError;

    /// Parses `first-last` (e.g. `10.10.1.3-10.10.1.254`) or a CIDR block.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((first, last)) = s.split_once('-') {
            let parse = |v: &str| {
                v.trim()
                    .parse::<Ipv4Addr>()
                    .map_err(|e| PoolError::InvalidConfig(format!("invalid address {v:?}: {e}")))
            };
            return Self::new(parse(first)?, parse(last)?);
        }

        let network = s
            .parse::<Ipv4Network>()
            .map_err(|e| PoolError::InvalidConfig(format!("invalid range {s:?}: {e}")))?;
        Self::from_network(network)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

#[derive(Debug, Default)]
struct PoolState {
    by_port: HashMap<String, Ipv4Addr>,
    in_use: HashSet<Ipv4Addr>,
}

/// A single named address pool keyed by port id
#[derive(Debug)]
pub struct AddressPool {
    name: String,
    range: AddressRange,
    state: Mutex<PoolState>,
}

impl AddressPool {
    pub fn new(name: impl Into<String>, range: AddressRange) -> Self {
        Self {
            name: name.into(),
            range,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> AddressRange {
        self.range
    }

    /// Returns the address mapped to `port_id`, mapping the lowest free one
    /// on first use.
    pub fn acquire(&self, port_id: &str) -> Result<Ipv4Addr, PoolError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(address) = state.by_port.get(port_id) {
            debug!("Port {} already holds {} in pool {}", port_id, address, self.name);
            return Ok(*address);
        }

        let address = self
            .range
            .addresses()
            .find(|a| !state.in_use.contains(a))
            .ok_or_else(|| PoolError::PoolExhausted {
                pool: self.name.clone(),
            })?;

        state.in_use.insert(address);
        state.by_port.insert(port_id.to_string(), address);
        info!("Allocated {} from pool {} to port {}", address, self.name, port_id);
        Ok(address)
    }

    /// Address currently mapped to `port_id`, if any
    pub fn lookup(&self, port_id: &str) -> Option<Ipv4Addr> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.by_port.get(port_id).copied()
    }

    /// Unmaps `port_id` and returns its address to the pool
    pub fn release(&self, port_id: &str) -> Option<Ipv4Addr> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let address = state.by_port.remove(port_id)?;
        state.in_use.remove(&address);
        info!("Released {} from pool {} (port {})", address, self.name, port_id);
        Some(address)
    }

    /// Number of unmapped addresses
    pub fn available(&self) -> u64 {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.range.size() - state.in_use.len() as u64
    }
}

/// Workload and bootstrap address pools
#[derive(Debug)]
pub struct IpAllocator {
    workload: AddressPool,
    bootstrap: AddressPool,
}

impl IpAllocator {
    pub fn new(workload: AddressRange, bootstrap: AddressRange) -> Self {
        Self {
            workload: AddressPool::new(WORKLOAD_POOL, workload),
            bootstrap: AddressPool::new(BOOTSTRAP_POOL, bootstrap),
        }
    }

    /// Workload subnet address for a port (idempotent per port)
    pub fn allocate_ip(&self, port_id: &str) -> Result<Ipv4Addr, PoolError> {
        self.workload.acquire(port_id)
    }

    /// Bootstrap network address for a port (idempotent per port)
    pub fn bootstrap_ip(&self, port_id: &str) -> Result<Ipv4Addr, PoolError> {
        self.bootstrap.acquire(port_id)
    }

    /// Releases both addresses held by a port
    pub fn release(&self, port_id: &str) -> (Option<Ipv4Addr>, Option<Ipv4Addr>) {
        (self.workload.release(port_id), self.bootstrap.release(port_id))
    }

    pub fn workload_pool(&self) -> &AddressPool {
        &self.workload
    }

    pub fn bootstrap_pool(&self) -> &AddressPool {
        &self.bootstrap
    }
}
