//! SONA API client
//!
//! Implements the network controller calls used during onboarding.
//! Based on the ONOS openstacknetworking REST layout:
//! /onos/openstacknetworking/networks, /subnets and /ports

use crate::error::SonaError;
use crate::models::*;
use crate::provisioner_trait::NetworkProvisioner;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Root of the openstacknetworking REST API
const API_ROOT: &str = "/onos/openstacknetworking";

/// SONA API client
#[derive(Debug, Clone)]
pub struct SonaClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl SonaClient {
    /// Create a new SONA client
    ///
    /// # Arguments
    /// * `base_url` - SONA base URL (e.g., "http://10.2.1.33:8181")
    /// * `username` - Basic-auth user
    /// * `password` - Basic-auth password
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: String,
        username: String,
        password: String,
        timeout: Duration,
    ) -> Result<Self, SonaError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, operation: ProvisionOperation) -> String {
        format!("{}{}/{}", self.base_url, API_ROOT, operation.collection())
    }

    /// Check connectivity and credentials by listing networks.
    ///
    /// # Returns
    /// * `Ok(())` - SONA is reachable and accepted the credentials
    /// * `Err(SonaError)` - SONA is unreachable or rejected the credentials
    pub async fn validate_connectivity(&self) -> Result<(), SonaError> {
        let url = self.collection_url(ProvisionOperation::Network);
        debug!("Validating SONA connectivity at {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SonaError::from_transport(&url, e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == 401 || status == 403 {
            return Err(SonaError::Authentication(format!("{status} - {body}")));
        }

        if !status.is_success() {
            return Err(SonaError::Api(format!(
                "GET {url} failed: {status} - {body}"
            )));
        }

        debug!("SONA connectivity validated");
        Ok(())
    }

    /// POST a provisioning body and capture status and body verbatim.
    async fn provision(
        &self,
        operation: ProvisionOperation,
        body: &serde_json::Value,
    ) -> Result<ProvisionResponse, SonaError> {
        let url = self.collection_url(operation);
        debug!(
            "POST {} with body: {}",
            url,
            serde_json::to_string(body).unwrap_or_default()
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| SonaError::from_transport(&url, e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| SonaError::from_transport(&url, e))?;

        debug!("POST {} returned {}", url, status);
        Ok(ProvisionResponse::new(status, text))
    }
}

#[async_trait::async_trait]
impl NetworkProvisioner for SonaClient {
    async fn create_network(&self, request: &NetworkRequest) -> Result<ProvisionResponse, SonaError> {
        self.provision(ProvisionOperation::Network, &request.to_body()).await
    }

    async fn create_subnet(&self, request: &SubnetRequest) -> Result<ProvisionResponse, SonaError> {
        self.provision(ProvisionOperation::Subnet, &request.to_body()).await
    }

    async fn create_port(&self, request: &PortRequest) -> Result<ProvisionResponse, SonaError> {
        self.provision(ProvisionOperation::Port, &request.to_body()).await
    }
}
