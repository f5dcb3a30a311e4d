//! The upload -> generate -> publish workflow.
//!
//! [`Workflow`] is the single orchestration point shared by the HTTP API, the
//! event functions and the package upload endpoint. It owns the store, the
//! client generator and the package publisher, and exposes the four
//! capabilities every entry point builds on: [`Workflow::parse`],
//! [`Workflow::diff`], [`Workflow::generate`] and [`Workflow::publish`].
//!
//! ```text
//! UPLOADED -> (generate) -> CLIENT_GENERATED -> (npm config) -> PUBLISHED
//!                                                          \-> PUBLISH_FAILED
//! ```
//!
//! Sub-step failures after a successful generation are reported in the
//! outcome rather than as errors, so callers can return partial success.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::diff::{compare, DiffFormat, DiffReport};
use crate::error::{Result, SpecforgeError};
use crate::generation::{build_prompt, ClientGenerator};
use crate::publish::{
    validate_package_name, PackageBundle, PackageManifest, PackagePublisher, PublishReceipt,
};
use crate::spec_parser::{parse_spec, SpecDocument, SpecFormat};
use crate::storage::{RecordedClient, Store};
use crate::types::{GeneratedClient, NpmConfig, Project, SpecVersion, Specification};
use crate::version::{SemVer, VersionAllocator, INITIAL_VERSION};

/// Longest accepted project name.
pub const MAX_PROJECT_NAME_LEN: usize = 200;

// ============================================================================
// Inputs and outcomes
// ============================================================================

/// Switches for the automatic parts of the workflow.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowOptions {
    /// Generate a client right after each upload.
    pub auto_generate: bool,
    /// Publish right after each successful generation.
    pub auto_publish: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            auto_generate: true,
            auto_publish: true,
        }
    }
}

/// What the generation step needs to know about a version.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    /// Owning project.
    pub project_id: Uuid,
    /// Version the client is generated for.
    pub spec_version_id: Uuid,
    /// Version string embedded in the prompt.
    pub version: String,
    /// Spec text embedded in the prompt.
    pub spec_content: String,
}

impl From<&SpecVersion> for GenerationInput {
    fn from(version: &SpecVersion) -> Self {
        Self {
            project_id: version.project_id,
            spec_version_id: version.id,
            version: version.version.clone(),
            spec_content: version.file_content.clone(),
        }
    }
}

/// npm settings as submitted by a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NpmConfigInput {
    /// Package name; validated against registry naming rules.
    pub package_name: String,
    /// Settings version; defaults to `1.0.0`.
    pub version: Option<String>,
    /// Package description.
    pub description: Option<String>,
    /// Package author.
    pub author: Option<String>,
}

/// Name and version of a package that was shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PackageRef {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
}

/// A successful publish.
#[derive(Debug, Clone)]
pub struct PublishedPackage {
    /// What was published.
    pub package: PackageRef,
    /// Publisher output.
    pub receipt: PublishReceipt,
    /// The version row after it was marked published.
    pub version: SpecVersion,
}

/// How the publish sub-step of a generation ended.
#[derive(Debug)]
pub enum PublishStatus {
    /// The package was shipped.
    Published(PublishedPackage),
    /// Automatic publishing is turned off.
    Skipped,
    /// Publishing failed; the generated client is kept.
    Failed(SpecforgeError),
}

/// Result of a successful generation.
#[derive(Debug)]
pub struct GenerationOutcome {
    /// The stored client.
    pub client: GeneratedClient,
    /// The version row as it stands after the publish sub-step.
    pub version: SpecVersion,
    /// What happened to the publish sub-step.
    pub publish: PublishStatus,
}

/// Result of an upload.
#[derive(Debug)]
pub struct UploadOutcome {
    /// The project's specification pointer.
    pub specification: Specification,
    /// The new version row.
    pub version: SpecVersion,
    /// Advisory parser warnings.
    pub warnings: Vec<String>,
    /// Outcome of automatic generation, when enabled.
    pub generation: Option<Result<GenerationOutcome>>,
}

/// A comparison between two versions of a project.
#[derive(Debug, Clone)]
pub struct VersionDiff {
    /// Older side.
    pub from: Option<SpecVersion>,
    /// Newer side.
    pub to: Option<SpecVersion>,
    /// Format both sides were normalized to.
    pub format: DiffFormat,
    /// The comparison.
    pub report: DiffReport,
}

/// A comparison between the two most recent clients of a project.
#[derive(Debug, Clone)]
pub struct ClientDiff {
    /// Older client.
    pub from: Option<GeneratedClient>,
    /// Newer client.
    pub to: Option<GeneratedClient>,
    /// The comparison.
    pub report: DiffReport,
}

// ============================================================================
// Event payloads
// ============================================================================

/// Fields an event function may receive, either directly or inside a
/// database webhook `record`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPayload {
    /// Spec version id (`record.id` in webhook form).
    pub spec_id: Option<String>,
    /// Project id.
    pub project_id: Option<String>,
    /// Version string.
    pub version: Option<String>,
    /// Spec text.
    pub file_content: Option<String>,
}

impl EventPayload {
    /// Normalize a raw `{spec_id, ...}` body or a webhook `{type, record}` body.
    #[must_use]
    pub fn from_json(body: &Value) -> Self {
        let text = |v: &Value, key: &str| -> Option<String> {
            match v.get(key)? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };

        let is_webhook = body.get("type").is_some_and(|t| !t.is_null())
            && body.get("record").is_some_and(Value::is_object);

        if is_webhook {
            let record = &body["record"];
            Self {
                spec_id: text(record, "id"),
                project_id: text(record, "project_id"),
                version: text(record, "version"),
                file_content: text(record, "file_content"),
            }
        } else {
            Self {
                spec_id: text(body, "spec_id"),
                project_id: text(body, "project_id"),
                version: text(body, "version"),
                file_content: text(body, "file_content"),
            }
        }
    }

    fn ids(&self) -> Result<(Uuid, Uuid)> {
        let (Some(spec_id), Some(project_id)) = (&self.spec_id, &self.project_id) else {
            return Err(missing_fields());
        };
        Ok((parse_id("spec_id", spec_id)?, parse_id("project_id", project_id)?))
    }
}

fn missing_fields() -> SpecforgeError {
    SpecforgeError::InvalidInput("Missing required fields".to_string())
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| SpecforgeError::InvalidInput(format!("{field} is not a valid id: '{raw}'")))
}

// ============================================================================
// Workflow
// ============================================================================

/// The orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct Workflow {
    store: Store,
    generator: Arc<dyn ClientGenerator>,
    publisher: Arc<dyn PackagePublisher>,
    allocator: VersionAllocator,
    options: WorkflowOptions,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("publisher", &self.publisher.backend())
            .field("allocator", &self.allocator)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Workflow {
    /// Wire a workflow from its collaborators.
    #[must_use]
    pub fn new(
        store: Store,
        generator: Arc<dyn ClientGenerator>,
        publisher: Arc<dyn PackagePublisher>,
    ) -> Self {
        Self {
            store,
            generator,
            publisher,
            allocator: VersionAllocator::default(),
            options: WorkflowOptions::default(),
        }
    }

    /// Use a different version allocation policy.
    #[must_use]
    pub const fn with_allocator(mut self, allocator: VersionAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    /// Override the automatic generation and publish switches.
    #[must_use]
    pub const fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Name of the configured publish backend.
    #[must_use]
    pub fn publish_backend(&self) -> &'static str {
        self.publisher.backend()
    }

    // ------------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------------

    /// Parse spec text.
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::Parse`] when the text is not an object in
    /// JSON or YAML.
    pub fn parse(&self, text: &str, filename: Option<&str>) -> Result<SpecDocument> {
        Ok(parse_spec(text, filename)?)
    }

    /// Compare two optional blobs after normalizing them to `format`.
    #[must_use]
    pub fn diff(&self, old: Option<&str>, new: Option<&str>, format: DiffFormat) -> DiffReport {
        compare(old, new, format)
    }

    /// Generate, store and (optionally) publish a client for one version.
    ///
    /// A generation failure leaves the version `client_ready = false` and
    /// stores no client. Publish failures are reported in
    /// [`GenerationOutcome::publish`].
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::Upstream`] when the generator fails, or a
    /// storage error.
    pub async fn generate(&self, input: &GenerationInput) -> Result<GenerationOutcome> {
        info!(
            project_id = %input.project_id,
            spec_version_id = %input.spec_version_id,
            version = %input.version,
            "Generating client"
        );

        let previous = match self.store.latest_client(input.project_id) {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "Could not load previous client; generating from scratch");
                None
            }
        };
        let prompt = build_prompt(
            &input.spec_content,
            &input.version,
            previous.as_ref().map(|c| c.client_code.as_str()),
        );

        let code = self.generator.generate(&prompt).await.map_err(|e| {
            error!(spec_version_id = %input.spec_version_id, error = %e, "Client generation failed");
            SpecforgeError::from(e)
        })?;

        let RecordedClient { client, version } = self
            .store
            .record_client(input.project_id, input.spec_version_id, &code)?;
        info!(client_id = %client.id, version = %version.version, "Client generated");

        let (version, publish) = if self.options.auto_publish {
            match self.publish(&version, &client.client_code).await {
                Ok(published) => (published.version.clone(), PublishStatus::Published(published)),
                Err(e) => {
                    warn!(error = %e, "Client generated but publishing failed");
                    let version = self.store.get_version(version.id).unwrap_or(version);
                    (version, PublishStatus::Failed(e))
                }
            }
        } else {
            (version, PublishStatus::Skipped)
        };

        Ok(GenerationOutcome {
            client,
            version,
            publish,
        })
    }

    /// Publish `client_code` as the package for `version`.
    ///
    /// On failure the error is recorded on the version row and returned.
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::ConfigMissing`] without npm settings or a
    /// registry credential, or [`SpecforgeError::PublishFailed`].
    pub async fn publish(&self, version: &SpecVersion, client_code: &str) -> Result<PublishedPackage> {
        let result = self.try_publish(version, client_code).await;
        if let Err(e) = &result {
            if let Err(store_err) = self.store.record_publish_failure(version.id, &e.to_string()) {
                error!(error = %store_err, "Failed to record publish failure");
            }
        }
        result
    }

    async fn try_publish(&self, version: &SpecVersion, client_code: &str) -> Result<PublishedPackage> {
        let config = self.store.get_npm_config(version.project_id)?.ok_or_else(|| {
            SpecforgeError::ConfigMissing(format!(
                "NPM configuration not found for project {}",
                version.project_id
            ))
        })?;

        let manifest = PackageManifest::from_config(&config, &version.version);
        let package = PackageRef {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
        };
        let bundle = PackageBundle::new(&manifest, client_code)?
            .for_version(version.project_id, version.id);

        info!(
            backend = self.publisher.backend(),
            package = %package.name,
            version = %package.version,
            "Publishing package"
        );
        let receipt = self.publisher.publish(&bundle).await?;
        let version = self.store.mark_published(version.id, Utc::now())?;
        info!(package = %package.name, version = %package.version, "Package published");

        Ok(PublishedPackage {
            package,
            receipt,
            version,
        })
    }

    // ------------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------------

    /// Create a project owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::InvalidInput`] for a blank or overlong name.
    pub fn create_project(&self, owner_id: &str, name: &str) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SpecforgeError::InvalidInput(
                "project name cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > MAX_PROJECT_NAME_LEN {
            return Err(SpecforgeError::InvalidInput(format!(
                "project name cannot be longer than {MAX_PROJECT_NAME_LEN} characters"
            )));
        }
        let project = self.store.create_project(name, owner_id)?;
        info!(project_id = %project.id, "Project created");
        Ok(project)
    }

    /// Projects owned by `owner_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn list_projects(&self, owner_id: &str) -> Result<Vec<Project>> {
        Ok(self.store.list_projects(owner_id)?)
    }

    /// Fetch a project, checking that `owner_id` owns it.
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::NotFound`] or
    /// [`SpecforgeError::Authorization`].
    pub fn authorize(&self, owner_id: &str, project_id: Uuid) -> Result<Project> {
        let project = self.store.get_project(project_id)?;
        if project.owner_id != owner_id {
            warn!(project_id = %project_id, "Rejected access to project by non-owner");
            return Err(SpecforgeError::Authorization { project_id });
        }
        Ok(project)
    }

    // ------------------------------------------------------------------------
    // Specifications
    // ------------------------------------------------------------------------

    /// Store a new spec version and, when enabled, generate its client.
    ///
    /// # Errors
    ///
    /// Returns a parse, authorization, version or storage error. Generation
    /// errors are reported in [`UploadOutcome::generation`].
    pub async fn upload_spec(
        &self,
        owner_id: &str,
        project_id: Uuid,
        content: &str,
        filename: Option<&str>,
    ) -> Result<UploadOutcome> {
        self.authorize(owner_id, project_id)?;
        let document = self.parse(content, filename)?;

        let recorded = self.store.record_upload(project_id, content, &self.allocator)?;
        info!(
            project_id = %project_id,
            version = %recorded.version.version,
            format = ?document.format,
            "Specification uploaded"
        );

        let generation = if self.options.auto_generate {
            Some(self.generate(&GenerationInput::from(&recorded.version)).await)
        } else {
            None
        };

        Ok(UploadOutcome {
            specification: recorded.specification,
            version: recorded.version,
            warnings: document.warnings(),
            generation,
        })
    }

    /// The project's current specification and its parsed document.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    pub fn current_spec(
        &self,
        owner_id: &str,
        project_id: Uuid,
    ) -> Result<Option<(Specification, Option<SpecDocument>)>> {
        self.authorize(owner_id, project_id)?;
        Ok(self.store.current_specification(project_id)?.map(|spec| {
            let document = parse_spec(&spec.file_content, None).ok();
            (spec, document)
        }))
    }

    /// All versions of a project, newest first.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    pub fn list_versions(&self, owner_id: &str, project_id: Uuid) -> Result<Vec<SpecVersion>> {
        self.authorize(owner_id, project_id)?;
        Ok(self.store.list_versions(project_id)?)
    }

    /// One version of a project.
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::NotFound`] when the version does not belong to
    /// the project.
    pub fn get_version(&self, owner_id: &str, project_id: Uuid, version_id: Uuid) -> Result<SpecVersion> {
        self.authorize(owner_id, project_id)?;
        self.version_in_project(project_id, version_id)
    }

    fn version_in_project(&self, project_id: Uuid, version_id: Uuid) -> Result<SpecVersion> {
        let version = self.store.get_version(version_id)?;
        if version.project_id != project_id {
            return Err(SpecforgeError::NotFound {
                entity: "spec version",
                id: version_id.to_string(),
            });
        }
        Ok(version)
    }

    // ------------------------------------------------------------------------
    // Diffs
    // ------------------------------------------------------------------------

    /// Compare two versions of a project.
    ///
    /// `to` defaults to the newest version and `from` to the one before `to`.
    /// The format defaults to the one detected from the newer side.
    ///
    /// # Errors
    ///
    /// Returns an authorization, not-found or storage error.
    pub fn diff_versions(
        &self,
        owner_id: &str,
        project_id: Uuid,
        from: Option<Uuid>,
        to: Option<Uuid>,
        format: Option<DiffFormat>,
    ) -> Result<VersionDiff> {
        self.authorize(owner_id, project_id)?;
        let versions = self.store.list_versions(project_id)?;

        let to = match to {
            Some(id) => Some(self.version_in_project(project_id, id)?),
            None => versions.first().cloned(),
        };
        let from = match from {
            Some(id) => Some(self.version_in_project(project_id, id)?),
            None => to.as_ref().and_then(|newer| {
                versions
                    .iter()
                    .skip_while(|v| v.id != newer.id)
                    .nth(1)
                    .cloned()
            }),
        };

        let format = format.unwrap_or_else(|| {
            to.as_ref()
                .or(from.as_ref())
                .map_or(DiffFormat::Json, |v| SpecFormat::sniff(&v.file_content).into())
        });
        let report = self.diff(
            from.as_ref().map(|v| v.file_content.as_str()),
            to.as_ref().map(|v| v.file_content.as_str()),
            format,
        );

        Ok(VersionDiff {
            from,
            to,
            format,
            report,
        })
    }

    /// Compare the two most recent generated clients of a project.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    pub fn diff_clients(&self, owner_id: &str, project_id: Uuid) -> Result<ClientDiff> {
        self.authorize(owner_id, project_id)?;
        let mut latest = self.store.latest_clients(project_id, 2)?.into_iter();
        let to = latest.next();
        let from = latest.next();
        let report = self.diff(
            from.as_ref().map(|c| c.client_code.as_str()),
            to.as_ref().map(|c| c.client_code.as_str()),
            DiffFormat::Text,
        );
        Ok(ClientDiff { from, to, report })
    }

    // ------------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------------

    /// The newest generated client of a project.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    pub fn latest_client(&self, owner_id: &str, project_id: Uuid) -> Result<Option<GeneratedClient>> {
        self.authorize(owner_id, project_id)?;
        Ok(self.store.latest_client(project_id)?)
    }

    /// Generate (or regenerate) the client of one version on request.
    ///
    /// # Errors
    ///
    /// See [`Workflow::generate`].
    pub async fn generate_for_version(
        &self,
        owner_id: &str,
        project_id: Uuid,
        version_id: Uuid,
    ) -> Result<GenerationOutcome> {
        self.authorize(owner_id, project_id)?;
        let version = self.version_in_project(project_id, version_id)?;
        self.generate(&GenerationInput::from(&version)).await
    }

    /// Publish the newest client of one version on request.
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::ClientNotReady`] when no client has been
    /// generated, or any error of [`Workflow::publish`].
    pub async fn publish_version(
        &self,
        owner_id: &str,
        project_id: Uuid,
        version_id: Uuid,
    ) -> Result<PublishedPackage> {
        self.authorize(owner_id, project_id)?;
        self.publish_ready_version(project_id, version_id).await
    }

    async fn publish_ready_version(&self, project_id: Uuid, version_id: Uuid) -> Result<PublishedPackage> {
        let version = self.version_in_project(project_id, version_id)?;
        if !version.client_ready {
            return Err(SpecforgeError::ClientNotReady { version_id });
        }
        let client = self
            .store
            .latest_client_for_version(version_id)?
            .ok_or_else(|| SpecforgeError::NotFound {
                entity: "generated client",
                id: version_id.to_string(),
            })?;
        if client.client_code.trim().is_empty() {
            return Err(SpecforgeError::InvalidInput("Client code is empty".to_string()));
        }
        self.publish(&version, &client.client_code).await
    }

    // ------------------------------------------------------------------------
    // npm configuration
    // ------------------------------------------------------------------------

    /// The project's npm settings.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    pub fn npm_config(&self, owner_id: &str, project_id: Uuid) -> Result<Option<NpmConfig>> {
        self.authorize(owner_id, project_id)?;
        Ok(self.store.get_npm_config(project_id)?)
    }

    /// Create or replace the project's npm settings.
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::InvalidInput`] for an unacceptable package
    /// name or version.
    pub fn save_npm_config(
        &self,
        owner_id: &str,
        project_id: Uuid,
        input: NpmConfigInput,
    ) -> Result<NpmConfig> {
        self.authorize(owner_id, project_id)?;

        let package_name = input.package_name.trim().to_string();
        validate_package_name(&package_name)
            .map_err(|reason| SpecforgeError::InvalidInput(reason.to_string()))?;

        let version = input
            .version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| INITIAL_VERSION.to_string());
        version
            .parse::<SemVer>()
            .map_err(|e| SpecforgeError::InvalidInput(e.to_string()))?;

        let blank_to_none = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let config = NpmConfig {
            project_id,
            package_name,
            version,
            description: blank_to_none(input.description),
            author: blank_to_none(input.author),
        };
        let saved = self.store.upsert_npm_config(&config)?;
        info!(project_id = %project_id, package = %saved.package_name, "npm configuration saved");
        Ok(saved)
    }

    // ------------------------------------------------------------------------
    // Event functions and raw package upload
    // ------------------------------------------------------------------------

    /// Handle a `generate-client` event.
    ///
    /// The spec text and version come from the payload; the version row must
    /// exist and belong to the named project.
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::InvalidInput`] when required fields are
    /// missing, otherwise any error of [`Workflow::generate`].
    pub async fn handle_generate_event(&self, payload: &EventPayload) -> Result<GenerationOutcome> {
        let (spec_id, project_id) = payload.ids()?;
        let Some(file_content) = payload.file_content.clone() else {
            return Err(missing_fields());
        };
        let version = self.version_in_project(project_id, spec_id)?;

        self.generate(&GenerationInput {
            project_id,
            spec_version_id: spec_id,
            version: payload.version.clone().unwrap_or(version.version),
            spec_content: file_content,
        })
        .await
    }

    /// Handle a `publish-client` event.
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::InvalidInput`] when required fields are
    /// missing, otherwise any error of [`Workflow::publish_version`].
    pub async fn handle_publish_event(&self, payload: &EventPayload) -> Result<PublishedPackage> {
        let (spec_id, project_id) = payload.ids()?;
        self.publish_ready_version(project_id, spec_id).await
    }

    /// Publish a caller-supplied manifest and entry file.
    ///
    /// The registry credential always comes from server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SpecforgeError::InvalidInput`] for a manifest that is not a
    /// JSON object, [`SpecforgeError::ConfigMissing`] without a credential, or
    /// [`SpecforgeError::PublishFailed`].
    pub async fn publish_package(&self, manifest: &str, module_source: &str) -> Result<PublishReceipt> {
        let manifest: Value = serde_json::from_str(manifest)
            .map_err(|e| SpecforgeError::InvalidInput(format!("package.json is not valid JSON: {e}")))?;
        if !manifest.is_object() {
            return Err(SpecforgeError::InvalidInput(
                "package.json must be a JSON object".to_string(),
            ));
        }
        let package = manifest.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
        info!(
            backend = self.publisher.backend(),
            package,
            "Publishing uploaded package"
        );
        Ok(self
            .publisher
            .publish(&PackageBundle::raw(manifest, module_source))
            .await?)
    }
}
