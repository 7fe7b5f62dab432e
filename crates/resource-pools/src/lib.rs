//! Resource Pools
//!
//! Shared, explicitly constructed allocators used by the onboarding workflow:
//!
//! - [`HostAllocator`]: places clusters on hosts with enough free capacity.
//! - [`IpAllocator`]: issues workload and bootstrap addresses per port.
//!
//! Both allocators keep their state behind a mutex so concurrent workflows
//! never receive the same capacity slice or address, and both are idempotent
//! per key (cluster id / port id).
//!
//! The [`HostAllocation`] and [`IpAllocation`] traits are the call boundary
//! the orchestrator depends on, so an out-of-process allocator can replace
//! the in-process ones.

pub mod error;
pub mod host;
pub mod ip;
pub mod service;

pub use error::PoolError;
pub use host::{HostAllocator, HostAssignment, HostCapacity, ResourceRequest};
pub use ip::{AddressPool, AddressRange, IpAllocator};
pub use service::{HostAllocation, IpAllocation};
