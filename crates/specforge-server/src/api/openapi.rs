//! OpenAPI specification generation for the specforge API.
//!
//! The document is served at `/api/openapi.json`, browsable at `/swagger-ui`
//! and written to disk by the `gen-openapi` binary.

use specforge_core::diff::{ChangeTag, DiffCell, DiffLine, NormalizedText, SplitRow};
use specforge_core::{
    DiffFormat, GeneratedClient, LifecycleState, NpmConfig, PackageRef, Project, PublishReceipt,
    SpecFormat, SpecVersion, Specification, ViewMode,
};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::clients::{
    GenerationReport, GenerationState, PublishClientResponse, PublishReport, PublishState,
};
use super::diffs::{DiffResponse, DiffSide, DiffStatus};
use super::error::ErrorResponse;
use super::events::{EventErrorResponse, GenerateClientEventResponse, PublishClientEventResponse};
use super::health::{
    DatabaseHealth, GenerationHealth, HealthResponse, PublishHealth, ServiceStatus,
};
use super::identity::USER_HEADER;
use super::npm::{NpmConfigRequest, PublishNpmError, PublishNpmResponse};
use super::projects::{CreateProjectRequest, ProjectListResponse};
use super::specs::{
    CurrentSpecResponse, ParseSpecResponse, SpecContentRequest, UploadSpecResponse,
    VersionListResponse, VersionResponse,
};

/// Returns the OpenAPI specification as a string (for writing to file).
/// Used by the gen-openapi binary.
///
/// # Panics
///
/// Panics if the generated document cannot be serialized, which only
/// happens on a broken schema derive.
#[must_use]
pub fn get_openapi_json() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .expect("Failed to serialize OpenAPI spec")
}

/// Registers the header-based security schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    USER_HEADER,
                    "Authenticated user id, set by the gateway in front of the server",
                ))),
            );
            components.add_security_scheme(
                "webhook_secret",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    super::events::SECRET_HEADER,
                    "Shared secret for event functions, when one is configured",
                ))),
            );
        }
    }
}

/// Main OpenAPI document structure for specforge.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "specforge API",
        version = "0.1.0",
        description = r#"
# specforge API

specforge keeps a versioned history of OpenAPI specifications, generates a
JavaScript client for every version and publishes it to npm.

## Workflow

1. **Upload**: every upload becomes the project's next version (`1.0.0`, then `1.0.1`, ...)
2. **Generate**: a client is generated for the version, using the previous client as a base
3. **Publish**: with npm settings saved, the client is published as a package

A failure in a later step never undoes an earlier one: an upload whose generation
fails is still stored, and a client whose publish fails is still kept.

## Diffs

Versions and clients can be compared line by line in `split` or `unified` view.
Specifications are normalized (pretty JSON or YAML) before comparison.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local specforge server")
    ),
    modifiers(&SecurityAddon),
    security(("user_id" = [])),
    tags(
        (name = "system", description = "Health checks"),
        (name = "projects", description = "Projects owned by the acting user"),
        (name = "specs", description = "Specification uploads, versions and parsing"),
        (name = "diffs", description = "Line-level comparison of versions and clients"),
        (name = "clients", description = "Generated client code, generation and publishing"),
        (name = "npm", description = "npm package settings and raw package publishing"),
        (name = "events", description = "Event functions called by webhooks and other services")
    ),
    paths(
        // Health endpoints
        super::health::health_check,
        // Project endpoints
        super::projects::create_project,
        super::projects::list_projects,
        super::projects::get_project,
        // Specification endpoints
        super::specs::parse_spec,
        super::specs::upload_spec,
        super::specs::current_spec,
        super::specs::list_versions,
        super::specs::get_version,
        // Diff endpoints
        super::diffs::diff_versions,
        super::diffs::diff_clients,
        // Client endpoints
        super::clients::latest_client,
        super::clients::generate_client,
        super::clients::publish_client,
        // npm endpoints
        super::npm::get_npm_config,
        super::npm::put_npm_config,
        super::npm::publish_npm,
        // Event functions
        super::events::generate_client_event,
        super::events::publish_client_event,
    ),
    components(
        schemas(
            // Error types
            ErrorResponse,
            // Health types
            HealthResponse,
            ServiceStatus,
            DatabaseHealth,
            GenerationHealth,
            PublishHealth,
            // Domain types
            Project,
            Specification,
            SpecVersion,
            LifecycleState,
            GeneratedClient,
            NpmConfig,
            PackageRef,
            PublishReceipt,
            SpecFormat,
            // Project types
            CreateProjectRequest,
            ProjectListResponse,
            // Specification types
            SpecContentRequest,
            ParseSpecResponse,
            UploadSpecResponse,
            CurrentSpecResponse,
            VersionResponse,
            VersionListResponse,
            // Diff types
            DiffFormat,
            ViewMode,
            ChangeTag,
            DiffLine,
            DiffCell,
            SplitRow,
            NormalizedText,
            DiffStatus,
            DiffSide,
            DiffResponse,
            // Client types
            GenerationState,
            GenerationReport,
            PublishState,
            PublishReport,
            PublishClientResponse,
            // npm types
            NpmConfigRequest,
            PublishNpmResponse,
            PublishNpmError,
            // Event types
            GenerateClientEventResponse,
            PublishClientEventResponse,
            EventErrorResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "specforge API");
        assert!(spec.paths.paths.contains_key("/api/projects/{project_id}/spec"));
        assert!(spec.paths.paths.contains_key("/functions/generate-client"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"specforge API\""));
        assert!(json.contains("x-user-id"));
    }
}
