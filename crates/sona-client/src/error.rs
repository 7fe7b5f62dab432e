//! SONA client errors

use thiserror::Error;

/// Errors that can occur when talking to the SONA network controller
///
/// A non-201 answer is not an error at this layer; see
/// [`crate::ProvisionResponse`].
#[derive(Debug, Error)]
pub enum SonaError {
    /// HTTP request failed before a response status was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request exceeded the client timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Authentication failed (wrong username/password)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// SONA answered a non-provisioning request with an unexpected status
    #[error("SONA API error: {0}")]
    Api(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SonaError {
    /// Classify a transport error, separating client-side timeouts.
    pub(crate) fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SonaError::Timeout(format!("{url}: {err}"))
        } else {
            SonaError::Http(err)
        }
    }
}
