//! Generated client API endpoints.
//!
//! Clients are generated automatically after an upload, or on request for a
//! specific version. Publishing ships a version's newest client as an npm
//! package through the configured backend.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use specforge_core::{
    GeneratedClient, GenerationOutcome, PackageRef, PublishReceipt, PublishStatus,
    PublishedPackage, SpecforgeError,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::identity::ActingUser;
use crate::api::specs::VersionResponse;
use crate::state::SharedState;

/// Creates the clients router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/projects/{project_id}/clients/latest", get(latest_client))
        .route(
            "/projects/{project_id}/versions/{version_id}/generate",
            post(generate_client),
        )
        .route(
            "/projects/{project_id}/versions/{version_id}/publish",
            post(publish_client),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// How the publish sub-step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    /// The package was shipped.
    Published,
    /// Automatic publishing is turned off.
    Skipped,
    /// Publishing failed; the client is kept.
    Failed,
}

/// Outcome of a publish attempt made as part of a generation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "failed",
    "package": null,
    "output": null,
    "notices": [],
    "error": {
        "error": "config_missing",
        "message": "NPM configuration not found for project 0190f4c2-8a55-7b41-9c1e-2d6f0a3b4c5d",
        "details": null
    }
}))]
pub struct PublishReport {
    /// Publish status.
    pub status: PublishState,

    /// Package that was shipped.
    #[schema(nullable)]
    pub package: Option<PackageRef>,

    /// Publisher standard output.
    #[schema(nullable)]
    pub output: Option<String>,

    /// Informational diagnostics from the publisher.
    pub notices: Vec<String>,

    /// Why publishing failed.
    #[schema(nullable)]
    pub error: Option<ErrorResponse>,
}

impl From<PublishStatus> for PublishReport {
    fn from(status: PublishStatus) -> Self {
        match status {
            PublishStatus::Published(published) => Self {
                status: PublishState::Published,
                package: Some(published.package),
                output: Some(published.receipt.output),
                notices: published.receipt.notices,
                error: None,
            },
            PublishStatus::Skipped => Self {
                status: PublishState::Skipped,
                package: None,
                output: None,
                notices: Vec::new(),
                error: None,
            },
            PublishStatus::Failed(err) => Self {
                status: PublishState::Failed,
                package: None,
                output: None,
                notices: Vec::new(),
                error: Some(ErrorResponse::from(&err)),
            },
        }
    }
}

/// Whether client generation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    /// A client was generated and stored.
    Generated,
    /// The generator failed; nothing was stored.
    Failed,
}

/// Outcome of a client generation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerationReport {
    /// Generation status.
    pub status: GenerationState,

    /// The stored client.
    #[schema(nullable)]
    pub client: Option<GeneratedClient>,

    /// The version row after generation and publishing.
    #[schema(nullable)]
    pub version: Option<VersionResponse>,

    /// Publish sub-step outcome.
    #[schema(nullable)]
    pub publish: Option<PublishReport>,

    /// Why generation failed.
    #[schema(nullable)]
    pub error: Option<ErrorResponse>,
}

impl From<GenerationOutcome> for GenerationReport {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            status: GenerationState::Generated,
            client: Some(outcome.client),
            version: Some(outcome.version.into()),
            publish: Some(outcome.publish.into()),
            error: None,
        }
    }
}

impl GenerationReport {
    /// Report a generation that ran as a sub-step of another request.
    #[must_use]
    pub fn from_result(result: Result<GenerationOutcome, SpecforgeError>) -> Self {
        match result {
            Ok(outcome) => outcome.into(),
            Err(err) => Self {
                status: GenerationState::Failed,
                client: None,
                version: None,
                publish: None,
                error: Some(ErrorResponse::from(&err)),
            },
        }
    }
}

/// Result of an explicit publish.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishClientResponse {
    /// Package that was shipped.
    pub package: PackageRef,

    /// Publisher output and notices.
    pub receipt: PublishReceipt,

    /// The version row after it was marked published.
    pub version: VersionResponse,
}

impl From<PublishedPackage> for PublishClientResponse {
    fn from(published: PublishedPackage) -> Self {
        Self {
            package: published.package,
            receipt: published.receipt,
            version: published.version.into(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Fetch the newest generated client of a project.
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/clients/latest",
    tag = "clients",
    operation_id = "getLatestClient",
    summary = "Get the latest generated client",
    params(("project_id" = Uuid, Path, description = "Project identifier")),
    responses(
        (status = 200, description = "Newest client", body = GeneratedClient),
        (status = 403, description = "Project belongs to another user", body = ErrorResponse),
        (status = 404, description = "No client generated yet", body = ErrorResponse)
    )
)]
pub async fn latest_client(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<GeneratedClient>> {
    state
        .workflow
        .latest_client(user.id(), project_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            error_code: "not_found".to_string(),
            message: format!("No client generated yet for project '{project_id}'"),
        })
}

/// Generate (or regenerate) the client of one version.
///
/// When automatic publishing is on, the new client is published right away;
/// a publish failure is reported in `publish` without failing the request.
#[utoipa::path(
    post,
    path = "/api/projects/{project_id}/versions/{version_id}/generate",
    tag = "clients",
    operation_id = "generateClient",
    summary = "Generate a client for a version",
    params(
        ("project_id" = Uuid, Path, description = "Project identifier"),
        ("version_id" = Uuid, Path, description = "Spec version identifier")
    ),
    responses(
        (status = 200, description = "Client generated", body = GenerationReport),
        (status = 404, description = "Version not found in project", body = ErrorResponse),
        (status = 502, description = "Generative endpoint failed", body = ErrorResponse)
    )
)]
pub async fn generate_client(
    State(state): State<SharedState>,
    user: ActingUser,
    Path((project_id, version_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<GenerationReport>> {
    let outcome = state
        .workflow
        .generate_for_version(user.id(), project_id, version_id)
        .await?;
    Ok(Json(outcome.into()))
}

/// Publish the newest client of one version.
#[utoipa::path(
    post,
    path = "/api/projects/{project_id}/versions/{version_id}/publish",
    tag = "clients",
    operation_id = "publishClient",
    summary = "Publish a version's client to npm",
    params(
        ("project_id" = Uuid, Path, description = "Project identifier"),
        ("version_id" = Uuid, Path, description = "Spec version identifier")
    ),
    responses(
        (status = 200, description = "Package published", body = PublishClientResponse),
        (status = 400, description = "npm configuration or registry credential missing", body = ErrorResponse),
        (status = 409, description = "Version has no generated client", body = ErrorResponse),
        (status = 500, description = "Publish command failed", body = ErrorResponse)
    )
)]
pub async fn publish_client(
    State(state): State<SharedState>,
    user: ActingUser,
    Path((project_id, version_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<PublishClientResponse>> {
    let published = state
        .workflow
        .publish_version(user.id(), project_id, version_id)
        .await?;
    Ok(Json(published.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_publish_report() {
        let report = PublishReport::from(PublishStatus::Skipped);
        assert_eq!(report.status, PublishState::Skipped);
        assert!(report.error.is_none());
    }

    #[test]
    fn test_failed_generation_report() {
        let report = GenerationReport::from_result(Err(SpecforgeError::Upstream(
            "endpoint returned 500".to_string(),
        )));
        assert_eq!(report.status, GenerationState::Failed);
        let error = report.error.unwrap();
        assert_eq!(error.error, "upstream_error");
        assert!(error.message.contains("500"));

        let json = serde_json::to_value(GenerationReport::from_result(Err(
            SpecforgeError::InvalidInput("x".to_string()),
        )))
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json["client"].is_null());
    }
}
