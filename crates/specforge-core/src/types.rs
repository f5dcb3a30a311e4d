//! Shared domain types and OpenAPI schemas.
//!
//! These mirror the five persisted tables: projects, specifications,
//! spec_versions, npm_configs and generated_clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A user-owned container for one API and its spec history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Project {
    /// Project identifier.
    pub id: Uuid,

    /// Display name.
    #[schema(example = "Petstore")]
    pub name: String,

    /// Identifier of the owning user.
    #[schema(example = "user_2abc")]
    pub owner_id: String,

    /// Creation time (UTC).
    pub created_at: DateTime<Utc>,
}

/// The current-spec pointer for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Specification {
    /// Specification identifier.
    pub id: Uuid,

    /// Owning project.
    pub project_id: Uuid,

    /// Raw spec text, JSON or YAML.
    pub file_content: String,

    /// Creation time (UTC).
    pub created_at: DateTime<Utc>,

    /// Version of the content currently pointed at.
    #[schema(example = "1.0.3")]
    pub version: Option<String>,
}

/// One immutable entry in a project's spec history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SpecVersion {
    /// Version row identifier.
    pub id: Uuid,

    /// Owning project.
    pub project_id: Uuid,

    /// Back-reference to the specification pointer.
    pub spec_id: Uuid,

    /// Semantic version string.
    #[schema(example = "1.0.3")]
    pub version: String,

    /// Raw spec text of this version.
    pub file_content: String,

    /// Creation time (UTC).
    pub created_at: DateTime<Utc>,

    /// Whether a package for this version was published. Never reset.
    pub is_published: bool,

    /// Whether a generated client exists for this version.
    pub client_ready: bool,

    /// When the package was published.
    pub published_at: Option<DateTime<Utc>>,

    /// Message of the most recent failed publish attempt.
    pub publish_error: Option<String>,
}

impl SpecVersion {
    /// Lifecycle state derived from the row's flags.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        if self.is_published {
            LifecycleState::Published
        } else if !self.client_ready {
            LifecycleState::Uploaded
        } else if self.publish_error.is_some() {
            LifecycleState::PublishFailed
        } else {
            LifecycleState::ClientGenerated
        }
    }
}

/// Where a spec version is in the upload -> generate -> publish flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Stored, no client generated yet.
    Uploaded,
    /// A client exists; not published.
    ClientGenerated,
    /// The package was published.
    Published,
    /// The last publish attempt failed; the client is still usable.
    PublishFailed,
}

/// Per-project npm package settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NpmConfig {
    /// Owning project (one-to-one).
    pub project_id: Uuid,

    /// npm package name.
    #[schema(example = "@acme/petstore-client")]
    pub package_name: String,

    /// Version recorded in the settings dialog. Published packages take the
    /// spec version instead.
    #[schema(example = "1.0.0")]
    pub version: String,

    /// Package description.
    pub description: Option<String>,

    /// Package author.
    pub author: Option<String>,
}

/// AI-generated client code for one spec version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GeneratedClient {
    /// Client row identifier.
    pub id: Uuid,

    /// Owning project.
    pub project_id: Uuid,

    /// Spec version the client was generated from.
    pub spec_version_id: Uuid,

    /// JavaScript source.
    pub client_code: String,

    /// Creation time (UTC).
    pub created_at: DateTime<Utc>,
}
