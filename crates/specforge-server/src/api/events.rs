//! Event function endpoints.
//!
//! Called by database webhooks or other services rather than by users, so
//! they take no acting user. Bodies are either `{spec_id, project_id, ...}`
//! or a webhook envelope `{type, record}` whose `record.id` is the spec
//! version id. When `events.webhook_secret` is set, callers must send it in
//! the `x-webhook-secret` header.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use specforge_core::{
    EventPayload, GenerationOutcome, PackageRef, PublishStatus, PublishedPackage, SpecforgeError,
};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::SharedState;

/// Header carrying the shared webhook secret.
pub const SECRET_HEADER: &str = "x-webhook-secret";

/// Creates the event functions router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/generate-client", post(generate_client_event))
        .route("/publish-client", post(publish_client_event))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Successful `generate-client` event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "message": "Client generated and package published",
    "client_id": "0190f4c2-8a55-7b41-9c1e-2d6f0a3b4c5d",
    "spec_id": "0190f4c2-8a55-7b41-9c1e-2d6f0a3b4c5e",
    "package": { "name": "@acme/petstore-client", "version": "1.0.3" }
}))]
pub struct GenerateClientEventResponse {
    /// Always `true`.
    pub success: bool,

    /// What happened.
    pub message: String,

    /// The stored client.
    pub client_id: Uuid,

    /// The spec version the client belongs to.
    pub spec_id: Uuid,

    /// The published package, when publishing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageRef>,

    /// Why publishing failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_error: Option<String>,
}

impl GenerateClientEventResponse {
    fn from_outcome(outcome: GenerationOutcome, backend: &str) -> Self {
        let (message, package, publish_error) = match outcome.publish {
            PublishStatus::Published(published) => {
                let message = if backend == "npm" {
                    "Client generated and package published"
                } else {
                    "Client generated and publishing workflow triggered"
                };
                (message, Some(published.package), None)
            }
            PublishStatus::Skipped => ("Client generated successfully", None, None),
            PublishStatus::Failed(err) => (
                "Client generated successfully but publishing failed",
                None,
                Some(err.to_string()),
            ),
        };

        Self {
            success: true,
            message: message.to_string(),
            client_id: outcome.client.id,
            spec_id: outcome.version.id,
            package,
            publish_error,
        }
    }
}

/// Successful `publish-client` event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishClientEventResponse {
    /// Always `true`.
    pub success: bool,

    /// What happened.
    pub message: String,

    /// The published package.
    pub package: PackageRef,
}

impl From<PublishedPackage> for PublishClientEventResponse {
    fn from(published: PublishedPackage) -> Self {
        Self {
            success: true,
            message: "Client code published successfully".to_string(),
            package: published.package,
        }
    }
}

/// Failed event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Failed to generate client",
    "details": "Generation failed: generation endpoint returned 500: internal"
}))]
pub struct EventErrorResponse {
    /// Short description.
    pub error: String,

    /// Underlying cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error side of the event endpoints, rendered as `{error, details}`.
#[derive(Debug)]
pub struct EventFailure {
    status: StatusCode,
    body: EventErrorResponse,
}

impl EventFailure {
    fn new(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            body: EventErrorResponse {
                error: error.into(),
                details,
            },
        }
    }

    /// Map a workflow error: bad payloads are `400`, anything else is a
    /// `500` under `summary`.
    fn from_workflow(err: &SpecforgeError, summary: &str) -> Self {
        match err {
            SpecforgeError::InvalidInput(message) => {
                Self::new(StatusCode::BAD_REQUEST, message.clone(), None)
            }
            other => {
                error!(error = %other, "{summary}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    summary,
                    Some(other.to_string()),
                )
            }
        }
    }
}

impl IntoResponse for EventFailure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn check_secret(state: &SharedState, headers: &HeaderMap) -> Result<(), EventFailure> {
    let Some(expected) = state.config.events.webhook_secret.as_deref() else {
        return Ok(());
    };
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if provided == Some(expected) {
        Ok(())
    } else {
        warn!("Event rejected: webhook secret mismatch");
        Err(EventFailure::new(
            StatusCode::UNAUTHORIZED,
            "Invalid webhook secret",
            None,
        ))
    }
}

fn read_payload(body: &Bytes) -> Result<EventPayload, EventFailure> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        EventFailure::new(
            StatusCode::BAD_REQUEST,
            "Invalid JSON body",
            Some(e.to_string()),
        )
    })?;
    Ok(EventPayload::from_json(&value))
}

// ============================================================================
// Handlers
// ============================================================================

/// Generate a client for a freshly inserted spec version.
#[utoipa::path(
    post,
    path = "/functions/generate-client",
    tag = "events",
    operation_id = "generateClientEvent",
    summary = "Generate a client from an event",
    description = "Accepts `{spec_id, project_id, version, file_content}` or a webhook \
        envelope `{type, record}`. Publishing runs afterwards when enabled; its failure \
        is reported in `publish_error` without failing the event.",
    security(("webhook_secret" = [])),
    request_body(content = serde_json::Value, description = "Direct payload or webhook envelope"),
    responses(
        (status = 200, description = "Client generated", body = GenerateClientEventResponse),
        (status = 400, description = "Missing required fields", body = EventErrorResponse),
        (status = 401, description = "Wrong webhook secret", body = EventErrorResponse),
        (status = 500, description = "Generation failed", body = EventErrorResponse)
    )
)]
pub async fn generate_client_event(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<GenerateClientEventResponse>, EventFailure> {
    check_secret(&state, &headers)?;
    let payload = read_payload(&body)?;
    info!(spec_id = ?payload.spec_id, project_id = ?payload.project_id, "generate-client event");

    let outcome = state
        .workflow
        .handle_generate_event(&payload)
        .await
        .map_err(|e| EventFailure::from_workflow(&e, "Failed to generate client"))?;

    Ok(Json(GenerateClientEventResponse::from_outcome(
        outcome,
        state.workflow.publish_backend(),
    )))
}

/// Publish the newest client of a spec version.
#[utoipa::path(
    post,
    path = "/functions/publish-client",
    tag = "events",
    operation_id = "publishClientEvent",
    summary = "Publish a client from an event",
    security(("webhook_secret" = [])),
    request_body(content = serde_json::Value, description = "Direct payload or webhook envelope"),
    responses(
        (status = 200, description = "Package published", body = PublishClientEventResponse),
        (status = 400, description = "Missing required fields", body = EventErrorResponse),
        (status = 401, description = "Wrong webhook secret", body = EventErrorResponse),
        (status = 500, description = "Publishing failed", body = EventErrorResponse)
    )
)]
pub async fn publish_client_event(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PublishClientEventResponse>, EventFailure> {
    check_secret(&state, &headers)?;
    let payload = read_payload(&body)?;
    info!(spec_id = ?payload.spec_id, project_id = ?payload.project_id, "publish-client event");

    let published = state
        .workflow
        .handle_publish_event(&payload)
        .await
        .map_err(|e| EventFailure::from_workflow(&e, "Failed to publish client"))?;

    Ok(Json(published.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_is_bad_request() {
        let failure = EventFailure::from_workflow(
            &SpecforgeError::InvalidInput("Missing required fields".to_string()),
            "Failed to generate client",
        );
        assert_eq!(failure.status, StatusCode::BAD_REQUEST);
        assert_eq!(failure.body.error, "Missing required fields");
        assert!(failure.body.details.is_none());
    }

    #[test]
    fn test_other_errors_are_internal() {
        let failure = EventFailure::from_workflow(
            &SpecforgeError::Upstream("generation endpoint returned 500".to_string()),
            "Failed to generate client",
        );
        assert_eq!(failure.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure.body.error, "Failed to generate client");
        assert!(failure.body.details.unwrap().contains("500"));
    }

    #[test]
    fn test_malformed_body() {
        let failure = read_payload(&Bytes::from_static(b"{not json")).unwrap_err();
        assert_eq!(failure.status, StatusCode::BAD_REQUEST);
    }
}
