//! Specification API endpoints.
//!
//! Every upload creates a new immutable spec version with the next version
//! number and moves the project's current-spec pointer. With automatic
//! generation on, the upload response also carries the generation outcome;
//! a generation failure never fails the upload itself.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use specforge_core::{LifecycleState, SpecFormat, SpecVersion, Specification};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::clients::GenerationReport;
use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::identity::ActingUser;
use crate::state::SharedState;

/// Creates the specifications router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/specs/parse", post(parse_spec))
        .route(
            "/projects/{project_id}/spec",
            get(current_spec).post(upload_spec),
        )
        .route("/projects/{project_id}/versions", get(list_versions))
        .route(
            "/projects/{project_id}/versions/{version_id}",
            get(get_version),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Raw specification text as uploaded.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "content": "openapi: 3.0.0\ninfo:\n  title: Petstore\n  version: 1.0.0\npaths: {}\n",
    "filename": "petstore.yaml"
}))]
pub struct SpecContentRequest {
    /// JSON or YAML text.
    pub content: String,

    /// Original file name; its extension decides which decoder runs first.
    #[schema(example = "petstore.yaml", nullable)]
    pub filename: Option<String>,
}

/// A spec version together with its derived lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VersionResponse {
    /// The version row.
    #[serde(flatten)]
    pub version: SpecVersion,

    /// Where the version is in the upload -> generate -> publish flow.
    pub state: LifecycleState,
}

impl From<SpecVersion> for VersionResponse {
    fn from(version: SpecVersion) -> Self {
        let state = version.state();
        Self { version, state }
    }
}

/// Result of an upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadSpecResponse {
    /// The project's current-spec row after the upload.
    pub specification: Specification,

    /// The version created by this upload.
    pub version: VersionResponse,

    /// Advisory warnings, e.g. the text does not look like OpenAPI.
    pub warnings: Vec<String>,

    /// Outcome of automatic generation; absent when it is turned off.
    #[schema(nullable)]
    pub generation: Option<GenerationReport>,
}

/// The project's current specification.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentSpecResponse {
    /// The current-spec row.
    pub specification: Specification,

    /// Detected encoding; absent when stored text no longer parses.
    #[schema(nullable)]
    pub format: Option<SpecFormat>,

    /// Parsed document.
    #[schema(nullable, value_type = Object)]
    pub document: Option<Value>,

    /// Advisory warnings.
    pub warnings: Vec<String>,
}

/// All versions of a project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VersionListResponse {
    /// Versions, newest first.
    pub versions: Vec<VersionResponse>,
}

/// A parsed document, not persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "format": "yaml",
    "looks_like_openapi": true,
    "warnings": [],
    "document": { "openapi": "3.0.0", "paths": {} }
}))]
pub struct ParseSpecResponse {
    /// Decoder that accepted the text.
    pub format: SpecFormat,

    /// Whether any of `openapi`, `swagger`, `info` or `paths` is present.
    pub looks_like_openapi: bool,

    /// Advisory warnings.
    pub warnings: Vec<String>,

    /// Decoded top-level object.
    #[schema(value_type = Object)]
    pub document: Value,
}

// ============================================================================
// Handlers
// ============================================================================

/// Decode specification text without storing it.
#[utoipa::path(
    post,
    path = "/api/specs/parse",
    tag = "specs",
    operation_id = "parseSpec",
    summary = "Parse a specification",
    description = "Decodes JSON or YAML text into an object. Text that decodes but \
        lacks the usual OpenAPI keys is accepted with a warning.",
    request_body = SpecContentRequest,
    responses(
        (status = 200, description = "Parsed document", body = ParseSpecResponse),
        (status = 400, description = "Text is neither JSON nor YAML, or not an object", body = ErrorResponse)
    )
)]
pub async fn parse_spec(
    State(state): State<SharedState>,
    _user: ActingUser,
    Json(request): Json<SpecContentRequest>,
) -> ApiResult<Json<ParseSpecResponse>> {
    let document = state
        .workflow
        .parse(&request.content, request.filename.as_deref())?;
    Ok(Json(ParseSpecResponse {
        format: document.format,
        looks_like_openapi: document.looks_like_openapi(),
        warnings: document.warnings(),
        document: document.to_value(),
    }))
}

/// Upload a new specification version.
#[utoipa::path(
    post,
    path = "/api/projects/{project_id}/spec",
    tag = "specs",
    operation_id = "uploadSpec",
    summary = "Upload a specification",
    description = "Stores the text as the project's next version (first upload is \
        1.0.0, then the patch number increments) and, when enabled, generates \
        and publishes its client.",
    params(("project_id" = Uuid, Path, description = "Project identifier")),
    request_body = SpecContentRequest,
    responses(
        (status = 201, description = "Version stored", body = UploadSpecResponse),
        (status = 400, description = "Unparseable specification", body = ErrorResponse),
        (status = 403, description = "Project belongs to another user", body = ErrorResponse),
        (status = 422, description = "Stored history holds a malformed version", body = ErrorResponse)
    )
)]
pub async fn upload_spec(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(project_id): Path<Uuid>,
    Json(request): Json<SpecContentRequest>,
) -> ApiResult<(StatusCode, Json<UploadSpecResponse>)> {
    let outcome = state
        .workflow
        .upload_spec(
            user.id(),
            project_id,
            &request.content,
            request.filename.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadSpecResponse {
            specification: outcome.specification,
            version: outcome.version.into(),
            warnings: outcome.warnings,
            generation: outcome.generation.map(GenerationReport::from_result),
        }),
    ))
}

/// Fetch the project's current specification.
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/spec",
    tag = "specs",
    operation_id = "getCurrentSpec",
    summary = "Get the current specification",
    params(("project_id" = Uuid, Path, description = "Project identifier")),
    responses(
        (status = 200, description = "Current specification", body = CurrentSpecResponse),
        (status = 404, description = "Nothing uploaded yet", body = ErrorResponse)
    )
)]
pub async fn current_spec(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<CurrentSpecResponse>> {
    let (specification, document) = state
        .workflow
        .current_spec(user.id(), project_id)?
        .ok_or_else(|| ApiError::NotFound {
            error_code: "not_found".to_string(),
            message: format!("No specification uploaded for project '{project_id}'"),
        })?;

    Ok(Json(CurrentSpecResponse {
        specification,
        format: document.as_ref().map(|d| d.format),
        warnings: document.as_ref().map(|d| d.warnings()).unwrap_or_default(),
        document: document.map(|d| d.to_value()),
    }))
}

/// List all versions of a project.
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/versions",
    tag = "specs",
    operation_id = "listVersions",
    summary = "List specification versions",
    params(("project_id" = Uuid, Path, description = "Project identifier")),
    responses(
        (status = 200, description = "Versions, newest first", body = VersionListResponse),
        (status = 403, description = "Project belongs to another user", body = ErrorResponse)
    )
)]
pub async fn list_versions(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<VersionListResponse>> {
    let versions = state.workflow.list_versions(user.id(), project_id)?;
    Ok(Json(VersionListResponse {
        versions: versions.into_iter().map(VersionResponse::from).collect(),
    }))
}

/// Fetch one version.
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/versions/{version_id}",
    tag = "specs",
    operation_id = "getVersion",
    summary = "Get a specification version",
    params(
        ("project_id" = Uuid, Path, description = "Project identifier"),
        ("version_id" = Uuid, Path, description = "Spec version identifier")
    ),
    responses(
        (status = 200, description = "The version", body = VersionResponse),
        (status = 404, description = "Version not found in project", body = ErrorResponse)
    )
)]
pub async fn get_version(
    State(state): State<SharedState>,
    user: ActingUser,
    Path((project_id, version_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<VersionResponse>> {
    let version = state.workflow.get_version(user.id(), project_id, version_id)?;
    Ok(Json(version.into()))
}
