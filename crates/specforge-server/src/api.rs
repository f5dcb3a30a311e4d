//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `health` - Service health checks
//! - `projects` - Project creation and listing
//! - `specs` - Specification uploads, versions and parsing
//! - `diffs` - Version and client comparison
//! - `clients` - Generated clients, generation and publishing
//! - `npm` - npm settings and raw package publishing
//! - `events` - Event functions for webhooks
//! - `identity` - Acting-user extraction
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::SharedState;

pub mod clients;
pub mod diffs;
pub mod error;
pub mod events;
pub mod health;
pub mod identity;
pub mod npm;
pub mod openapi;
pub mod projects;
pub mod specs;

// Re-export commonly used types
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use identity::ActingUser;

// Re-export OpenAPI utilities for the gen-openapi binary
pub use openapi::{get_openapi_json, ApiDoc};

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                                          - Health check
/// /api
/// ├── /projects                                    - List / create projects
/// ├── /projects/{project_id}                       - Project detail
/// ├── /projects/{project_id}/spec                  - Current spec / upload
/// ├── /projects/{project_id}/versions[/{id}]       - Version history
/// ├── /projects/{project_id}/versions/{id}/generate
/// ├── /projects/{project_id}/versions/{id}/publish
/// ├── /projects/{project_id}/diff                  - Version diff
/// ├── /projects/{project_id}/clients/latest
/// ├── /projects/{project_id}/clients/diff          - Client diff
/// ├── /projects/{project_id}/npm-config            - npm settings
/// ├── /specs/parse                                 - Parse without storing
/// ├── /publish-npm                                 - Raw package publish
/// └── /openapi.json                                - OpenAPI specification
/// /functions
/// ├── /generate-client                             - Generation event
/// └── /publish-client                              - Publish event
/// /swagger-ui                                      - API browser
/// ```
pub fn create_router(state: SharedState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(projects::router())
                .merge(specs::router())
                .merge(diffs::router())
                .merge(clients::router())
                .merge(npm::router()),
        )
        .nest("/functions", events::router())
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
