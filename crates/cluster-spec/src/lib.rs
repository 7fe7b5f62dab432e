//! Cluster Spec
//!
//! Builds the immutable [`ClusterDescriptor`] handed to the cluster
//! provisioning control plane, renders it as a Cluster API `Cluster`
//! resource, and defines the submission boundary ([`ClusterApi`]).

pub mod cluster;
pub mod descriptor;
pub mod error;
pub mod submit;

pub use cluster::*;
pub use descriptor::*;
pub use error::SpecError;
pub use submit::{ClusterApi, KubeClusterApi, LogOnlyClusterApi};
