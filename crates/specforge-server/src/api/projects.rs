//! Project API endpoints.
//!
//! Projects group the specification history, generated clients and npm
//! settings of one API. Every project belongs to the user who created it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use specforge_core::Project;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::identity::ActingUser;
use crate::state::SharedState;

/// Creates the projects router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/{project_id}", get(get_project))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "name": "Petstore" }))]
pub struct CreateProjectRequest {
    /// Display name, 1-200 characters.
    #[schema(example = "Petstore", min_length = 1, max_length = 200)]
    pub name: String,
}

/// The acting user's projects.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectListResponse {
    /// Projects, newest first.
    pub projects: Vec<Project>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a project owned by the acting user.
#[utoipa::path(
    post,
    path = "/api/projects",
    tag = "projects",
    operation_id = "createProject",
    summary = "Create a project",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Name is empty or too long", body = crate::api::ErrorResponse),
        (status = 401, description = "No acting user", body = crate::api::ErrorResponse)
    )
)]
pub async fn create_project(
    State(state): State<SharedState>,
    user: ActingUser,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state.workflow.create_project(user.id(), &request.name)?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// List the acting user's projects.
#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "projects",
    operation_id = "listProjects",
    summary = "List projects",
    responses(
        (status = 200, description = "Projects owned by the acting user", body = ProjectListResponse),
        (status = 401, description = "No acting user", body = crate::api::ErrorResponse)
    )
)]
pub async fn list_projects(
    State(state): State<SharedState>,
    user: ActingUser,
) -> ApiResult<Json<ProjectListResponse>> {
    let projects = state.workflow.list_projects(user.id())?;
    Ok(Json(ProjectListResponse { projects }))
}

/// Fetch one project.
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}",
    tag = "projects",
    operation_id = "getProject",
    summary = "Get a project",
    params(("project_id" = Uuid, Path, description = "Project identifier")),
    responses(
        (status = 200, description = "The project", body = Project),
        (status = 403, description = "Project belongs to another user", body = crate::api::ErrorResponse),
        (status = 404, description = "Project not found", body = crate::api::ErrorResponse)
    )
)]
pub async fn get_project(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.workflow.authorize(user.id(), project_id)?))
}
