//! # specforge-core
//!
//! Core logic for specforge: OpenAPI spec versioning, AI client generation
//! and npm publishing.
//!
//! ## Architecture
//!
//! - [`spec_parser`] - Best-effort JSON/YAML decoding of uploaded specs
//! - [`version`] - Next-version allocation from a project's history
//! - [`diff`] - Normalized line-level comparison of specs and clients
//! - [`generation`] - Prompt construction and the generative endpoint client
//! - [`publish`] - Package manifest construction and publish executors
//! - [`workflow`] - The upload -> generate -> publish orchestrator
//! - [`storage`] - SQLite persistence for projects, versions and clients
//! - [`config`] - Layered configuration loading and validation
//! - [`error`] - Unified error type for the crate
//! - [`types`] - Shared domain types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod diff;
pub mod error;
pub mod generation;
pub mod publish;
pub mod spec_parser;
pub mod storage;
pub mod types;
pub mod version;
pub mod workflow;

// Re-export primary types for convenience
pub use config::{Config, ConfigError, ConfigResult, PublishBackend};
pub use diff::{compare, DiffFormat, DiffReport, TextDiff, ViewMode};
pub use error::{Result, SpecforgeError};
pub use generation::{build_prompt, extract_code, ClientGenerator, GeminiGenerator, GenerationError};
pub use publish::{
    publisher_from_config, validate_package_name, GithubDispatchPublisher, NpmPublisher,
    PackageBundle, PackageManifest, PackagePublisher, PublishError, PublishReceipt,
};
pub use spec_parser::{parse_spec, ParseError, SpecDocument, SpecFormat};
pub use storage::{Store, StoreError};
pub use types::{
    GeneratedClient, LifecycleState, NpmConfig, Project, SpecVersion, Specification,
};
pub use version::{next_version, VersionAllocator, VersionBump, VersionError, INITIAL_VERSION};
pub use workflow::{
    ClientDiff, EventPayload, GenerationInput, GenerationOutcome, NpmConfigInput, PackageRef,
    PublishStatus, PublishedPackage, UploadOutcome, VersionDiff, Workflow, WorkflowOptions,
};
