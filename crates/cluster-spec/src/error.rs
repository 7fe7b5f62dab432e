//! Cluster spec errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    /// One or more required descriptor fields were never set
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// A CIDR field does not parse as an IPv4 network
    #[error("Invalid CIDR for {field}: {value}")]
    InvalidCidr { field: &'static str, value: String },

    /// Rendering to YAML failed
    #[error("Render error: {0}")]
    Render(#[from] serde_yaml::Error),

    /// The cluster API rejected the submitted resource
    #[error("Cluster API rejected {name}: {status} - {message}")]
    Rejected {
        name: String,
        status: u16,
        message: String,
    },

    /// Kubernetes client error without an API status
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}
