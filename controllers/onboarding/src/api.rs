//! HTTP surface
//!
//! Routes:
//! - `GET  /healthz`
//! - `GET  /catalogs`, `POST /catalogs`
//! - `POST /clusters` (store catalog, then onboard)
//! - `GET  /clusters/{cluster_id}/resources`
//! - `DELETE /clusters/{cluster_id}/resources` (drop local records and
//!   allocations so a failed onboarding can be retried)
//! - `POST /catalogs/{cluster_id}/charts/{chart_id}/deploy`

use crate::deploy::{ChartCatalog, DeployError, Deployer, DeploymentReport, spawn_deployment};
use crate::error::OnboardingError;
use crate::model::{CatalogIntent, CatalogRequest, FieldError};
use crate::orchestrator::{OnboardingOutcome, Orchestrator, ReleasedCluster};
use crate::store::{CatalogStore, ClusterResources, ResourceStore, StoreError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use resource_pools::{HostAllocation, PoolError};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub catalogs: Arc<dyn CatalogStore>,
    pub resources: Arc<dyn ResourceStore>,
    pub hosts: Arc<dyn HostAllocation>,
    pub orchestrator: Arc<Orchestrator>,
    pub deployer: Arc<dyn Deployer>,
    pub charts: Arc<ChartCatalog>,
    pub deploy_timeout: Duration,
    /// Parent of every onboarding's cancellation token
    pub shutdown: CancellationToken,
}

/// Errors surfaced by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Onboarding(#[from] OnboardingError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::DuplicateCatalog(_)) => StatusCode::CONFLICT,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Deploy(DeployError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Deploy(_) => StatusCode::BAD_GATEWAY,
            ApiError::Onboarding(e) => match e {
                OnboardingError::Validation { .. } => StatusCode::BAD_REQUEST,
                OnboardingError::Precondition { .. } => StatusCode::CONFLICT,
                OnboardingError::RemoteProvisioning { .. } | OnboardingError::Transport { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                OnboardingError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                OnboardingError::CapacityExhausted { .. }
                | OnboardingError::PoolExhausted { .. }
                | OnboardingError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
                OnboardingError::Allocation { .. }
                | OnboardingError::ClusterSpec { .. }
                | OnboardingError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let mut body = json!({ "error": self.to_string() });
        match &self {
            ApiError::Validation(fields) => body["fields"] = json!(fields),
            ApiError::Onboarding(e) => {
                if let OnboardingError::Validation { errors } = e {
                    body["fields"] = json!(errors);
                }
                if let Some(step) = e.step() {
                    body["step"] = json!(step);
                }
                if let OnboardingError::RemoteProvisioning {
                    status: upstream_status,
                    body: upstream_body,
                    ..
                } = e
                {
                    body["status"] = json!(upstream_status);
                    body["body"] = json!(upstream_body);
                }
                if !e.orphaned().is_empty() {
                    body["orphaned"] = json!(e.orphaned());
                }
                body["retryable"] = json!(e.is_retryable());
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

/// Result of `POST /clusters`
#[derive(Debug, Serialize)]
pub struct OnboardResponse {
    pub catalog: CatalogIntent,
    pub cluster: OnboardingOutcome,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/catalogs", get(list_catalogs).post(create_catalog))
        .route("/clusters", post(onboard_cluster))
        .route(
            "/clusters/{cluster_id}/resources",
            get(cluster_resources).delete(release_cluster),
        )
        .route(
            "/catalogs/{cluster_id}/charts/{chart_id}/deploy",
            post(deploy_chart),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_catalogs(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogIntent>>, ApiError> {
    Ok(Json(state.catalogs.list().await?))
}

async fn create_catalog(
    State(state): State<AppState>,
    payload: Result<Json<CatalogRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CatalogIntent>), ApiError> {
    let Json(request) = payload?;
    let intent = request.into_intent().map_err(ApiError::Validation)?;
    let created = state.catalogs.create(intent).await?;
    info!("Created catalog {}", created.cluster_id);
    Ok((StatusCode::CREATED, Json(created)))
}

async fn onboard_cluster(
    State(state): State<AppState>,
    payload: Result<Json<CatalogRequest>, JsonRejection>,
) -> Result<Json<OnboardResponse>, ApiError> {
    let Json(request) = payload?;
    let intent = request
        .with_generated_cluster_id()
        .into_intent()
        .map_err(ApiError::Validation)?;

    match state.catalogs.get(&intent.cluster_id).await? {
        Some(existing) if existing == intent => {}
        Some(_) => {
            return Err(ApiError::Conflict(format!(
                "catalog {} exists with different parameters",
                intent.cluster_id
            )));
        }
        None => {
            state.catalogs.create(intent.clone()).await?;
        }
    }

    // The workflow runs on its own task; dropping this handler (client
    // disconnect) cancels it before its next remote call.
    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let orchestrator = Arc::clone(&state.orchestrator);
    let task_intent = intent.clone();
    let outcome = tokio::spawn(async move { orchestrator.onboard(&task_intent, &cancel).await })
        .await
        .map_err(|e| ApiError::Internal(format!("onboarding task failed: {e}")))??;

    Ok(Json(OnboardResponse {
        catalog: intent,
        cluster: outcome,
    }))
}

async fn cluster_resources(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
) -> Result<Json<ClusterResources>, ApiError> {
    state
        .resources
        .cluster_resources(&cluster_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no resources for cluster {cluster_id}")))
}

async fn release_cluster(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
) -> Result<Json<ReleasedCluster>, ApiError> {
    let released = state.orchestrator.release(&cluster_id).await?;
    if released.is_empty() {
        return Err(ApiError::NotFound(format!("no resources for cluster {cluster_id}")));
    }
    Ok(Json(released))
}

async fn deploy_chart(
    State(state): State<AppState>,
    Path((cluster_id, chart_id)): Path<(String, String)>,
) -> Result<Json<DeploymentReport>, ApiError> {
    if state.catalogs.get(&cluster_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("catalog {cluster_id}")));
    }

    let host_ip = match state.hosts.host_ip(&cluster_id).await {
        Ok(host_ip) => host_ip,
        Err(PoolError::UnknownCluster(_)) => {
            return Err(ApiError::NotFound(format!(
                "cluster {cluster_id} has not been placed on a host"
            )));
        }
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };

    let chart_path = state.charts.chart_path(&chart_id).to_string();
    info!(
        "Deploying chart {} ({}) to cluster {} on {}",
        chart_id, chart_path, cluster_id, host_ip
    );

    let handle = spawn_deployment(
        Arc::clone(&state.deployer),
        host_ip,
        chart_path,
        state.deploy_timeout,
    );
    match handle.wait().await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            warn!("Deployment to cluster {} failed: {}", cluster_id, e);
            Err(e.into())
        }
    }
}
