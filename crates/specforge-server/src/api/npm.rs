//! npm API endpoints.
//!
//! Per-project package settings, plus a raw upload endpoint that publishes a
//! caller-built `package.json` and `index.js` with the server's registry
//! credential.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use specforge_core::workflow::NpmConfigInput;
use specforge_core::{NpmConfig, PublishBackend};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::identity::ActingUser;
use crate::state::SharedState;

/// Multipart field holding the manifest.
pub const MANIFEST_FIELD: &str = "package.json";
/// Multipart field holding the entry module.
pub const MODULE_FIELD: &str = "index.js";

const MISSING_TOKEN: &str = "NPM_PUBLISH_TOKEN is not configured in the server environment";

/// Creates the npm router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/projects/{project_id}/npm-config",
            get(get_npm_config).put(put_npm_config),
        )
        .route("/publish-npm", post(publish_npm))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// npm settings as submitted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "package_name": "@acme/petstore-client",
    "version": "1.0.0",
    "description": "Petstore API client",
    "author": "Acme"
}))]
pub struct NpmConfigRequest {
    /// Registry package name (lowercase, optional `@scope/`, max 214 chars).
    #[schema(example = "@acme/petstore-client")]
    pub package_name: String,

    /// Settings version; defaults to `1.0.0`.
    #[schema(nullable)]
    pub version: Option<String>,

    /// Package description.
    #[schema(nullable)]
    pub description: Option<String>,

    /// Package author.
    #[schema(nullable)]
    pub author: Option<String>,
}

impl From<NpmConfigRequest> for NpmConfigInput {
    fn from(request: NpmConfigRequest) -> Self {
        Self {
            package_name: request.package_name,
            version: request.version,
            description: request.description,
            author: request.author,
        }
    }
}

/// Successful raw publish.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "message": "Package published successfully",
    "details": "+ @acme/petstore-client@1.0.3\n"
}))]
pub struct PublishNpmResponse {
    /// Fixed success message.
    pub message: String,

    /// Publisher standard output.
    pub details: String,
}

/// Failed raw publish.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "message": "Missing required files" }))]
pub struct PublishNpmError {
    /// What went wrong.
    pub message: String,
}

/// Error side of the raw publish endpoint, rendered as `{message}`.
#[derive(Debug)]
pub struct PublishNpmFailure {
    status: StatusCode,
    message: String,
}

impl PublishNpmFailure {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<specforge_core::SpecforgeError> for PublishNpmFailure {
    fn from(err: specforge_core::SpecforgeError) -> Self {
        let status = if err.http_status_code() == 400 {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %err, "Raw package publish failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for PublishNpmFailure {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(PublishNpmError {
                message: self.message,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Fetch the project's npm settings.
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/npm-config",
    tag = "npm",
    operation_id = "getNpmConfig",
    summary = "Get npm settings",
    params(("project_id" = Uuid, Path, description = "Project identifier")),
    responses(
        (status = 200, description = "npm settings", body = NpmConfig),
        (status = 404, description = "No npm settings saved", body = ErrorResponse)
    )
)]
pub async fn get_npm_config(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<NpmConfig>> {
    state
        .workflow
        .npm_config(user.id(), project_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            error_code: "not_found".to_string(),
            message: format!("NPM configuration not found for project {project_id}"),
        })
}

/// Create or replace the project's npm settings.
#[utoipa::path(
    put,
    path = "/api/projects/{project_id}/npm-config",
    tag = "npm",
    operation_id = "putNpmConfig",
    summary = "Save npm settings",
    params(("project_id" = Uuid, Path, description = "Project identifier")),
    request_body = NpmConfigRequest,
    responses(
        (status = 200, description = "Saved settings", body = NpmConfig),
        (status = 400, description = "Invalid package name or version", body = ErrorResponse),
        (status = 403, description = "Project belongs to another user", body = ErrorResponse)
    )
)]
pub async fn put_npm_config(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(project_id): Path<Uuid>,
    Json(request): Json<NpmConfigRequest>,
) -> ApiResult<Json<NpmConfig>> {
    let saved = state
        .workflow
        .save_npm_config(user.id(), project_id, request.into())?;
    Ok(Json(saved))
}

/// Publish an uploaded package.
///
/// Expects multipart fields `package.json` and `index.js`. The registry
/// credential always comes from the server environment.
#[utoipa::path(
    post,
    path = "/api/publish-npm",
    tag = "npm",
    operation_id = "publishNpm",
    summary = "Publish an uploaded package",
    request_body(content_type = "multipart/form-data", description = "Fields `package.json` and `index.js`"),
    responses(
        (status = 200, description = "Package published", body = PublishNpmResponse),
        (status = 400, description = "Missing files or registry credential", body = PublishNpmError),
        (status = 500, description = "Publish command failed", body = PublishNpmError)
    )
)]
pub async fn publish_npm(
    State(state): State<SharedState>,
    _user: ActingUser,
    mut multipart: Multipart,
) -> Result<Json<PublishNpmResponse>, PublishNpmFailure> {
    let publish = &state.config.publish;
    if publish.backend == PublishBackend::Npm
        && publish
            .npm_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .is_none()
    {
        return Err(PublishNpmFailure::bad_request(MISSING_TOKEN));
    }

    let mut manifest = None;
    let mut module_source = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PublishNpmFailure::bad_request(e.body_text()))?
    {
        let slot = match field.name() {
            Some(MANIFEST_FIELD) => &mut manifest,
            Some(MODULE_FIELD) => &mut module_source,
            _ => continue,
        };
        let text = field
            .text()
            .await
            .map_err(|e| PublishNpmFailure::bad_request(e.body_text()))?;
        *slot = Some(text);
    }

    let (Some(manifest), Some(module_source)) = (manifest, module_source) else {
        return Err(PublishNpmFailure::bad_request("Missing required files"));
    };

    let receipt = state
        .workflow
        .publish_package(&manifest, &module_source)
        .await?;
    info!(notices = receipt.notices.len(), "Uploaded package published");

    Ok(Json(PublishNpmResponse {
        message: "Package published successfully".to_string(),
        details: receipt.output,
    }))
}
