//! Unified error type for the specforge core library.
//!
//! Each module owns a specific error ([`ParseError`], [`VersionError`],
//! [`StoreError`], [`GenerationError`], [`PublishError`], [`ConfigError`]).
//! [`SpecforgeError`] folds them into the failure classes the workflow and the
//! HTTP layer care about, and carries an HTTP status and a stable error code.
//!
//! # Example
//!
//! ```rust
//! use specforge_core::error::{Result, SpecforgeError};
//!
//! fn require_name(name: &str) -> Result<()> {
//!     if name.trim().is_empty() {
//!         return Err(SpecforgeError::InvalidInput("name cannot be empty".into()));
//!     }
//!     Ok(())
//! }
//! # assert!(require_name("").is_err());
//! ```
//!
//! [`ParseError`]: crate::spec_parser::ParseError
//! [`VersionError`]: crate::version::VersionError
//! [`StoreError`]: crate::storage::StoreError
//! [`GenerationError`]: crate::generation::GenerationError
//! [`PublishError`]: crate::publish::PublishError
//! [`ConfigError`]: crate::config::ConfigError

use thiserror::Error;
use uuid::Uuid;

use crate::spec_parser::ParseError;
use crate::version::VersionError;

/// The unified error type for all specforge operations.
#[derive(Debug, Error)]
pub enum SpecforgeError {
    // =========================================================================
    // INPUT ERRORS
    // =========================================================================
    /// Uploaded text is neither JSON nor YAML, or is not an object.
    #[error("Invalid specification: {0}")]
    Parse(#[from] ParseError),

    /// A request field is missing or holds an unusable value.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The version history holds a value the allocator cannot increment.
    #[error("Cannot allocate version: {0}")]
    InvalidVersion(#[from] VersionError),

    // =========================================================================
    // ACCESS ERRORS
    // =========================================================================
    /// The acting user does not own the project.
    #[error("You do not have access to project '{project_id}'")]
    Authorization {
        /// Project that was requested.
        project_id: Uuid,
    },

    /// A referenced row does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of row that was looked up.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    // =========================================================================
    // WORKFLOW ERRORS
    // =========================================================================
    /// The generative endpoint failed or answered with an unusable payload.
    #[error("Generation failed: {0}")]
    Upstream(String),

    /// Publishing needs settings or credentials that are not present.
    #[error("{0}")]
    ConfigMissing(String),

    /// The publish command or dispatch call failed.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// A publish was requested for a version without a generated client.
    #[error("Spec version '{version_id}' has no generated client yet")]
    ClientNotReady {
        /// Version that was requested.
        version_id: Uuid,
    },

    // =========================================================================
    // INFRASTRUCTURE ERRORS
    // =========================================================================
    /// The database failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    ConfigValidation(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for specforge operations.
pub type Result<T> = std::result::Result<T, SpecforgeError>;

impl SpecforgeError {
    /// Returns `true` if the caller sent an unparseable specification.
    #[inline]
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Returns `true` if the generative endpoint is to blame.
    #[inline]
    #[must_use]
    pub const fn is_upstream_error(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    /// Returns `true` if publish settings or credentials are absent.
    #[inline]
    #[must_use]
    pub const fn is_config_missing(&self) -> bool {
        matches!(self, Self::ConfigMissing(_))
    }

    /// Returns `true` if the publish step itself failed.
    #[inline]
    #[must_use]
    pub const fn is_publish_error(&self) -> bool {
        matches!(self, Self::PublishFailed(_) | Self::ClientNotReady { .. })
    }

    /// Returns `true` if this is a database or file system failure.
    #[inline]
    #[must_use]
    pub const fn is_storage_error(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input or unmet precondition
            Self::Parse(_) | Self::InvalidInput(_) | Self::ConfigMissing(_) => 400,

            // 403 Forbidden
            Self::Authorization { .. } => 403,

            // 404 Not Found
            Self::NotFound { .. } => 404,

            // 409 Conflict - wrong lifecycle state
            Self::ClientNotReady { .. } => 409,

            // 422 Unprocessable Entity - history cannot be extended
            Self::InvalidVersion(_) => 422,

            // 502 Bad Gateway - generative endpoint failure
            Self::Upstream(_) => 502,

            // 500 Internal Server Error
            Self::PublishFailed(_) | Self::Storage(_) | Self::ConfigValidation(_) | Self::Io(_) => {
                500
            }
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "PARSE_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidVersion(_) => "INVALID_VERSION",
            Self::Authorization { .. } => "AUTHORIZATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::ConfigMissing(_) => "CONFIG_MISSING",
            Self::PublishFailed(_) => "PUBLISH_FAILED",
            Self::ClientNotReady { .. } => "CLIENT_NOT_READY",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::ConfigValidation(_) => "CONFIG_VALIDATION_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::storage::StoreError> for SpecforgeError {
    fn from(err: crate::storage::StoreError) -> Self {
        use crate::storage::StoreError;
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Version(e) => Self::InvalidVersion(e),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<crate::generation::GenerationError> for SpecforgeError {
    fn from(err: crate::generation::GenerationError) -> Self {
        use crate::generation::GenerationError;
        match err {
            GenerationError::MissingApiKey => Self::ConfigMissing(err.to_string()),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<crate::publish::PublishError> for SpecforgeError {
    fn from(err: crate::publish::PublishError) -> Self {
        if err.is_config_missing() {
            Self::ConfigMissing(err.to_string())
        } else {
            Self::PublishFailed(err.to_string())
        }
    }
}

impl From<crate::config::ConfigError> for SpecforgeError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::ConfigValidation(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
