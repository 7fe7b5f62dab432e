//! Mock SONA client for unit testing
//!
//! Records every provisioning call in order and answers with a configurable
//! status per operation, so tests can assert call ordering and failure
//! propagation without a running network controller.

use crate::error::SonaError;
use crate::models::*;
use crate::provisioner_trait::NetworkProvisioner;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A provisioning call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionCall {
    Network(NetworkRequest),
    Subnet(SubnetRequest),
    Port(PortRequest),
}

impl ProvisionCall {
    /// Operation kind of this call
    pub fn operation(&self) -> ProvisionOperation {
        match self {
            ProvisionCall::Network(_) => ProvisionOperation::Network,
            ProvisionCall::Subnet(_) => ProvisionOperation::Subnet,
            ProvisionCall::Port(_) => ProvisionOperation::Port,
        }
    }
}

/// Mock network provisioner
///
/// Defaults to answering `201 Created` for every call. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockSonaClient {
    calls: Arc<Mutex<Vec<ProvisionCall>>>,
    responses: Arc<Mutex<HashMap<ProvisionOperation, ProvisionResponse>>>,
    delays: Arc<Mutex<HashMap<ProvisionOperation, Duration>>>,
    failures: Arc<Mutex<HashMap<ProvisionOperation, String>>>,
}

impl MockSonaClient {
    /// Create a new mock that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `operation` with the given status and body (for test setup)
    pub fn respond_with(&self, operation: ProvisionOperation, status: u16, body: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(operation, ProvisionResponse::new(status, body));
    }

    /// Delay `operation` before answering (for timeout tests)
    pub fn delay(&self, operation: ProvisionOperation, delay: Duration) {
        self.delays.lock().unwrap().insert(operation, delay);
    }

    /// Fail `operation` without a response, as a broken connection would
    pub fn fail_with(&self, operation: ProvisionOperation, message: impl Into<String>) {
        self.failures.lock().unwrap().insert(operation, message.into());
    }

    /// All calls observed so far, in order
    pub fn calls(&self) -> Vec<ProvisionCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Operation kinds observed so far, in order
    pub fn operations(&self) -> Vec<ProvisionOperation> {
        self.calls().iter().map(ProvisionCall::operation).collect()
    }

    async fn answer(&self, call: ProvisionCall) -> Result<ProvisionResponse, SonaError> {
        let operation = call.operation();
        let delay = self.delays.lock().unwrap().get(&operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push(call);
        if let Some(message) = self.failures.lock().unwrap().get(&operation).cloned() {
            return Err(SonaError::Api(message));
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&operation)
            .cloned()
            .unwrap_or_else(ProvisionResponse::created))
    }
}

#[async_trait::async_trait]
impl NetworkProvisioner for MockSonaClient {
    async fn create_network(&self, request: &NetworkRequest) -> Result<ProvisionResponse, SonaError> {
        self.answer(ProvisionCall::Network(request.clone())).await
    }

    async fn create_subnet(&self, request: &SubnetRequest) -> Result<ProvisionResponse, SonaError> {
        self.answer(ProvisionCall::Subnet(request.clone())).await
    }

    async fn create_port(&self, request: &PortRequest) -> Result<ProvisionResponse, SonaError> {
        self.answer(ProvisionCall::Port(request.clone())).await
    }
}
