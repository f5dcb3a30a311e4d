//! Diff API endpoints.
//!
//! Both sides are normalized to the requested format before comparison, so
//! a JSON spec re-uploaded as YAML compares equal when its content is.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use specforge_core::diff::{DiffLine, NormalizedText, SplitRow};
use specforge_core::{DiffFormat, DiffReport, GeneratedClient, SpecVersion, ViewMode};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::identity::ActingUser;
use crate::state::SharedState;

/// Creates the diffs router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/projects/{project_id}/diff", get(diff_versions))
        .route("/projects/{project_id}/clients/diff", get(diff_clients))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for the version diff.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct VersionDiffQuery {
    /// Older version; defaults to the one before `to`.
    pub from: Option<Uuid>,

    /// Newer version; defaults to the newest.
    pub to: Option<Uuid>,

    /// Display format; defaults to the one detected from the newer side.
    #[param(inline)]
    pub format: Option<DiffFormat>,

    /// Layout of the comparison.
    #[param(inline)]
    pub view: Option<ViewMode>,
}

/// Query parameters for the client diff.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ClientDiffQuery {
    /// Layout of the comparison.
    #[param(inline)]
    pub view: Option<ViewMode>,
}

/// Whether a comparison was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    /// Both sides, or one side, were available.
    Compared,
    /// Neither side exists yet.
    NothingToCompare,
}

/// One side of a comparison.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiffSide {
    /// Version or client id.
    pub id: Uuid,

    /// Version string of the compared blob.
    #[schema(example = "1.0.3")]
    pub label: String,

    /// When the blob was stored.
    pub created_at: DateTime<Utc>,
}

impl From<&SpecVersion> for DiffSide {
    fn from(version: &SpecVersion) -> Self {
        Self {
            id: version.id,
            label: version.version.clone(),
            created_at: version.created_at,
        }
    }
}

/// A comparison laid out for display.
///
/// In `split` view `rows` is filled; in `unified` view `unified` and `lines`
/// are.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiffResponse {
    /// Whether anything was compared.
    pub status: DiffStatus,

    /// Format both sides were normalized to.
    pub format: DiffFormat,

    /// Requested layout.
    pub view: ViewMode,

    /// Older side.
    #[schema(nullable)]
    pub from: Option<DiffSide>,

    /// Newer side.
    #[schema(nullable)]
    pub to: Option<DiffSide>,

    /// Lines only in the newer side.
    pub additions: usize,

    /// Lines only in the older side.
    pub deletions: usize,

    /// Whether both sides are equal after normalization.
    pub identical: bool,

    /// Normalized older text.
    #[schema(nullable)]
    pub old: Option<NormalizedText>,

    /// Normalized newer text.
    #[schema(nullable)]
    pub new: Option<NormalizedText>,

    /// Unified rendering with ` `, `-` and `+` prefixes.
    #[schema(nullable)]
    pub unified: Option<String>,

    /// Line-level changes (unified view).
    pub lines: Vec<DiffLine>,

    /// Side-by-side rows (split view).
    pub rows: Vec<SplitRow>,
}

impl DiffResponse {
    fn render(
        report: DiffReport,
        format: DiffFormat,
        view: ViewMode,
        from: Option<DiffSide>,
        to: Option<DiffSide>,
    ) -> Self {
        let mut response = Self {
            status: DiffStatus::NothingToCompare,
            format,
            view,
            from,
            to,
            additions: 0,
            deletions: 0,
            identical: true,
            old: None,
            new: None,
            unified: None,
            lines: Vec::new(),
            rows: Vec::new(),
        };

        if let DiffReport::Compared(diff) = report {
            response.status = DiffStatus::Compared;
            response.additions = diff.additions;
            response.deletions = diff.deletions;
            response.identical = diff.is_identical();
            match view {
                ViewMode::Split => response.rows = diff.split_rows(),
                ViewMode::Unified => {
                    response.unified = Some(diff.unified());
                    response.lines = diff.lines;
                }
            }
            response.old = diff.old;
            response.new = diff.new;
        }

        response
    }
}

fn client_side(client: &GeneratedClient, label: &str) -> DiffSide {
    DiffSide {
        id: client.id,
        label: label.to_string(),
        created_at: client.created_at,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Compare two specification versions.
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/diff",
    tag = "diffs",
    operation_id = "diffVersions",
    summary = "Compare specification versions",
    description = "Without parameters, compares the newest version with the one before it.",
    params(
        ("project_id" = Uuid, Path, description = "Project identifier"),
        VersionDiffQuery
    ),
    responses(
        (status = 200, description = "Comparison", body = DiffResponse),
        (status = 404, description = "A requested version is not in the project", body = ErrorResponse)
    )
)]
pub async fn diff_versions(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(project_id): Path<Uuid>,
    Query(query): Query<VersionDiffQuery>,
) -> ApiResult<Json<DiffResponse>> {
    let diff = state.workflow.diff_versions(
        user.id(),
        project_id,
        query.from,
        query.to,
        query.format,
    )?;

    Ok(Json(DiffResponse::render(
        diff.report,
        diff.format,
        query.view.unwrap_or_default(),
        diff.from.as_ref().map(DiffSide::from),
        diff.to.as_ref().map(DiffSide::from),
    )))
}

/// Compare the two most recent generated clients.
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/clients/diff",
    tag = "diffs",
    operation_id = "diffClients",
    summary = "Compare the two latest clients",
    params(
        ("project_id" = Uuid, Path, description = "Project identifier"),
        ClientDiffQuery
    ),
    responses(
        (status = 200, description = "Comparison", body = DiffResponse),
        (status = 403, description = "Project belongs to another user", body = ErrorResponse)
    )
)]
pub async fn diff_clients(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ClientDiffQuery>,
) -> ApiResult<Json<DiffResponse>> {
    let diff = state.workflow.diff_clients(user.id(), project_id)?;

    let label = |client: &GeneratedClient| -> ApiResult<DiffSide> {
        let version = state
            .workflow
            .store()
            .get_version(client.spec_version_id)
            .map_err(specforge_core::SpecforgeError::from)?;
        Ok(client_side(client, &version.version))
    };
    let from = diff.from.as_ref().map(&label).transpose()?;
    let to = diff.to.as_ref().map(&label).transpose()?;

    Ok(Json(DiffResponse::render(
        diff.report,
        DiffFormat::Text,
        query.view.unwrap_or_default(),
        from,
        to,
    )))
}
