//! Controller-specific error types.
//!
//! `ControllerError` covers startup and serving. `OnboardingError` is the
//! workflow taxonomy: every variant past validation names the step that
//! failed and lists the committed resources left behind, since a failed
//! onboarding is never rolled back automatically.

use crate::model::FieldError;
use crate::store::StoreError;
use cluster_spec::SpecError;
use kube::Error as KubeError;
use resource_pools::PoolError;
use serde::Serialize;
use sona_client::SonaError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while starting or running the controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// SONA client error
    #[error("SONA error: {0}")]
    Sona(#[from] SonaError),

    /// Resource pool setup error
    #[error("Resource pool error: {0}")]
    Pool(#[from] PoolError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Listener or server I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Workflow step, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OnboardingStep {
    #[serde(rename = "network")]
    CreateNetwork,
    #[serde(rename = "subnet")]
    CreateSubnet,
    #[serde(rename = "port")]
    CreatePort,
    #[serde(rename = "host")]
    AllocateHost,
    #[serde(rename = "ip")]
    AllocateIp,
    #[serde(rename = "cluster-spec")]
    BuildClusterSpec,
    #[serde(rename = "submit")]
    SubmitCluster,
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OnboardingStep::CreateNetwork => "network",
            OnboardingStep::CreateSubnet => "subnet",
            OnboardingStep::CreatePort => "port",
            OnboardingStep::AllocateHost => "host",
            OnboardingStep::AllocateIp => "ip",
            OnboardingStep::BuildClusterSpec => "cluster-spec",
            OnboardingStep::SubmitCluster => "submit",
        };
        f.write_str(name)
    }
}

/// Kind of resource committed during a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    Subnet,
    Port,
    HostAssignment,
    WorkloadIp,
    BootstrapIp,
}

/// How far a committed resource got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceState {
    /// Local record only; the remote create was never sent
    Recorded,
    /// Local record and remote object both exist
    Provisioned,
    /// Local record exists; the remote create was refused
    Rejected,
    /// Local record exists; the remote outcome is unknown (timeout or transport)
    Unknown,
    /// Held in an in-process allocator
    Allocated,
}

/// A resource left behind by a failed workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedResource {
    pub kind: ResourceKind,
    pub id: String,
    pub state: ResourceState,
}

/// Errors returned by the onboarding workflow
#[derive(Debug, Error)]
pub enum OnboardingError {
    /// The intent failed validation; nothing was mutated
    #[error("Validation failed: {}", describe_fields(errors))]
    Validation { errors: Vec<FieldError> },

    /// A step's precondition does not hold; nothing was mutated by that step
    #[error("Precondition failed at step {step}: {reason}")]
    Precondition { step: OnboardingStep, reason: String },

    /// The remote system answered with something other than success
    #[error("Step {step} rejected by remote: {status} - {body}")]
    RemoteProvisioning {
        step: OnboardingStep,
        status: u16,
        body: String,
        orphaned: Vec<OrphanedResource>,
    },

    /// A remote call exceeded its deadline
    #[error("Step {step} timed out after {after:?}")]
    Timeout {
        step: OnboardingStep,
        after: Duration,
        orphaned: Vec<OrphanedResource>,
    },

    /// A remote call failed before any response arrived
    #[error("Step {step} failed: {message}")]
    Transport {
        step: OnboardingStep,
        message: String,
        orphaned: Vec<OrphanedResource>,
    },

    /// No host can take the requested resources
    #[error("Host capacity exhausted at step {step}: {source}")]
    CapacityExhausted {
        step: OnboardingStep,
        source: PoolError,
        orphaned: Vec<OrphanedResource>,
    },

    /// An address pool has no free address
    #[error("IP pool {pool} exhausted at step {step}")]
    PoolExhausted {
        step: OnboardingStep,
        pool: String,
        orphaned: Vec<OrphanedResource>,
    },

    /// Any other allocator failure
    #[error("Allocation failed at step {step}: {source}")]
    Allocation {
        step: OnboardingStep,
        source: PoolError,
        orphaned: Vec<OrphanedResource>,
    },

    /// The cluster descriptor could not be built or rendered
    #[error("Cluster spec failed at step {step}: {source}")]
    ClusterSpec {
        step: OnboardingStep,
        source: SpecError,
        orphaned: Vec<OrphanedResource>,
    },

    /// The local resource store failed
    #[error("Store error at step {step}: {source}")]
    Store {
        step: OnboardingStep,
        source: StoreError,
        orphaned: Vec<OrphanedResource>,
    },

    /// The workflow was cancelled before `step` started its remote call
    #[error("Onboarding cancelled at step {step}")]
    Cancelled {
        step: OnboardingStep,
        orphaned: Vec<OrphanedResource>,
    },
}

impl OnboardingError {
    /// Step that failed, if the workflow got past validation
    pub fn step(&self) -> Option<OnboardingStep> {
        match self {
            OnboardingError::Validation { .. } => None,
            OnboardingError::Precondition { step, .. }
            | OnboardingError::RemoteProvisioning { step, .. }
            | OnboardingError::Timeout { step, .. }
            | OnboardingError::Transport { step, .. }
            | OnboardingError::CapacityExhausted { step, .. }
            | OnboardingError::PoolExhausted { step, .. }
            | OnboardingError::Allocation { step, .. }
            | OnboardingError::ClusterSpec { step, .. }
            | OnboardingError::Store { step, .. }
            | OnboardingError::Cancelled { step, .. } => Some(*step),
        }
    }

    /// Resources committed before the failure
    pub fn orphaned(&self) -> &[OrphanedResource] {
        match self {
            OnboardingError::Validation { .. } | OnboardingError::Precondition { .. } => &[],
            OnboardingError::RemoteProvisioning { orphaned, .. }
            | OnboardingError::Timeout { orphaned, .. }
            | OnboardingError::Transport { orphaned, .. }
            | OnboardingError::CapacityExhausted { orphaned, .. }
            | OnboardingError::PoolExhausted { orphaned, .. }
            | OnboardingError::Allocation { orphaned, .. }
            | OnboardingError::ClusterSpec { orphaned, .. }
            | OnboardingError::Store { orphaned, .. }
            | OnboardingError::Cancelled { orphaned, .. } => orphaned,
        }
    }

    /// Whether retrying the same intent (after cleanup) could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            OnboardingError::Timeout { .. }
            | OnboardingError::Transport { .. }
            | OnboardingError::CapacityExhausted { .. }
            | OnboardingError::PoolExhausted { .. }
            | OnboardingError::Cancelled { .. } => true,
            OnboardingError::RemoteProvisioning { status, .. } => *status >= 500,
            OnboardingError::Validation { .. }
            | OnboardingError::Precondition { .. }
            | OnboardingError::Allocation { .. }
            | OnboardingError::ClusterSpec { .. }
            | OnboardingError::Store { .. } => false,
        }
    }
}

fn describe_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}
