//! Readiness endpoint.
//!
//! Reports whether the database answers and whether generation and
//! publishing have what they need. Only an unreachable database makes the
//! service unhealthy; missing credentials degrade single workflow steps.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::state::SharedState;

/// Overall service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Everything needed for upload -> generate -> publish is in place.
    Ok,
    /// Uploads work, but generation or publishing will report a missing
    /// credential.
    Degraded,
    /// The database does not answer.
    Unavailable,
}

/// Database reachability.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DatabaseHealth {
    /// Whether a trivial query succeeded.
    pub reachable: bool,

    /// Failure message when unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Generative endpoint readiness.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerationHealth {
    /// Whether an API key is configured.
    pub configured: bool,

    /// Whether uploads trigger generation.
    pub auto_generate: bool,
}

/// Publish backend readiness.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishHealth {
    /// Backend packages are shipped through (`npm` or `github_dispatch`).
    #[schema(example = "npm")]
    pub backend: String,

    /// Whether the backend's credential is configured.
    pub credential_configured: bool,

    /// Whether generation is followed by a publish attempt.
    pub auto_publish: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "degraded",
    "version": "0.1.0",
    "database": { "reachable": true },
    "generation": { "configured": true, "auto_generate": true },
    "publish": { "backend": "npm", "credential_configured": false, "auto_publish": true }
}))]
pub struct HealthResponse {
    /// Overall status.
    pub status: ServiceStatus,

    /// Service version from Cargo.toml.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Database check.
    pub database: DatabaseHealth,

    /// Generation check.
    pub generation: GenerationHealth,

    /// Publish check.
    pub publish: PublishHealth,
}

impl HealthResponse {
    fn overall_status(&self) -> ServiceStatus {
        if !self.database.reachable {
            ServiceStatus::Unavailable
        } else if self.generation.configured && self.publish.credential_configured {
            ServiceStatus::Ok
        } else {
            ServiceStatus::Degraded
        }
    }
}

/// Creates the health router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/health", get(health_check))
}

/// Readiness of the database, generation and publishing.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check service readiness",
    description = "Answers 200 while the database is reachable, with `status` \
        `degraded` when generation or publishing lacks a credential, and 503 \
        when the database does not answer.",
    security(()),
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.workflow.store().ping() {
        Ok(()) => DatabaseHealth {
            reachable: true,
            error: None,
        },
        Err(e) => {
            error!(error = %e, "Health check: database unreachable");
            DatabaseHealth {
                reachable: false,
                error: Some(e.to_string()),
            }
        }
    };

    let config = &state.config;
    let mut response = HealthResponse {
        status: ServiceStatus::Ok,
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        generation: GenerationHealth {
            configured: config
                .generation
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty()),
            auto_generate: config.generation.auto_generate,
        },
        publish: PublishHealth {
            backend: state.workflow.publish_backend().to_string(),
            credential_configured: config.has_publish_credential(),
            auto_publish: config.publish.auto_publish,
        },
    };
    response.status = response.overall_status();

    let code = if response.status == ServiceStatus::Unavailable {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(response))
}
