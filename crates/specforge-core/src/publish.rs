//! Package publishing.
//!
//! [`PackageManifest`] is the one place a `package.json` is built. A
//! [`PackagePublisher`] ships a manifest plus a single-file module:
//!
//! - [`NpmPublisher`] materializes the package in a fresh temporary directory,
//!   writes a registry credential file, runs the package manager and removes
//!   the directory whatever the outcome.
//! - [`GithubDispatchPublisher`] hands the package to a repository workflow
//!   through a `repository_dispatch` event.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{Config, DispatchConfig, PublishBackend, PublishConfig};
use crate::types::NpmConfig;

/// Description used when the project has none.
pub const DEFAULT_DESCRIPTION: &str = "Generated API client";

/// Entry file name inside the package.
pub const ENTRY_FILE: &str = "index.js";

/// Keywords attached to every generated package.
pub const PACKAGE_KEYWORDS: [&str; 5] = ["api", "client", "openapi", "swagger", "generated"];

/// Longest package name the registry accepts.
pub const MAX_PACKAGE_NAME_LEN: usize = 214;

static PACKAGE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:@[a-z0-9][a-z0-9._~-]*/)?[a-z0-9][a-z0-9._~-]*$").expect("Invalid regex pattern")
});

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while publishing a package.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No registry token is configured on the server.
    #[error("NPM_PUBLISH_TOKEN is not configured in the server environment")]
    MissingToken,

    /// The dispatch backend lacks a token or owner.
    #[error("repository dispatch is not configured: missing {0}")]
    MissingDispatchCredentials(&'static str),

    /// The manifest could not be serialized.
    #[error("invalid package manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    /// The working directory could not be created or written.
    #[error("failed to prepare publish directory: {0}")]
    Workspace(#[source] std::io::Error),

    /// The package manager could not be started.
    #[error("failed to run '{command}': {source}")]
    Spawn {
        /// Executable that was invoked.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The package manager exited unsuccessfully.
    #[error("publish command exited with {}: {stderr}", exit_label(.code))]
    CommandFailed {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },

    /// The package manager printed diagnostics that are not informational.
    #[error("publish command reported errors: {stderr}")]
    UnexpectedDiagnostics {
        /// The offending stderr lines.
        stderr: String,
    },

    /// The dispatch request could not be sent.
    #[error("dispatch request failed: {0}")]
    Dispatch(#[from] reqwest::Error),

    /// The dispatch endpoint answered with a non-success status.
    #[error("failed to trigger publish workflow: {status} {body}")]
    DispatchRejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

impl PublishError {
    /// Returns `true` when publishing cannot start for lack of credentials.
    #[must_use]
    pub const fn is_config_missing(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::MissingDispatchCredentials(_)
        )
    }
}

/// Result alias for publish operations.
pub type PublishResult<T> = std::result::Result<T, PublishError>;

// ============================================================================
// Manifest
// ============================================================================

/// A generated package's `package.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PackageManifest {
    /// Package name.
    #[schema(example = "@acme/petstore-client")]
    pub name: String,
    /// Package version; always the spec version.
    #[schema(example = "1.0.3")]
    pub version: String,
    /// Package description.
    pub description: String,
    /// Entry point.
    pub main: String,
    /// Package author.
    pub author: String,
    /// License identifier.
    pub license: String,
    /// Registry search keywords.
    pub keywords: Vec<String>,
}

impl PackageManifest {
    /// Build the manifest for publishing `version` of a project.
    #[must_use]
    pub fn from_config(config: &NpmConfig, version: &str) -> Self {
        Self {
            name: config.package_name.clone(),
            version: version.to_string(),
            description: config
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            main: ENTRY_FILE.to_string(),
            author: config.author.clone().unwrap_or_default(),
            license: "MIT".to_string(),
            keywords: PACKAGE_KEYWORDS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Check a package name against the registry's naming rules.
///
/// # Errors
///
/// Returns a human-readable reason when the name is not acceptable.
pub fn validate_package_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("package name cannot be empty");
    }
    if name.len() > MAX_PACKAGE_NAME_LEN {
        return Err("package name cannot be longer than 214 characters");
    }
    if name.chars().any(char::is_whitespace) {
        return Err("package name cannot contain spaces");
    }
    if name.chars().any(char::is_uppercase) {
        return Err("package name must be lowercase");
    }
    if !PACKAGE_NAME.is_match(name) {
        return Err("package name must be URL-safe, optionally scoped as @scope/name");
    }
    Ok(())
}

// ============================================================================
// Publisher interface
// ============================================================================

/// Everything a publisher ships.
#[derive(Debug, Clone)]
pub struct PackageBundle {
    /// `package.json` contents.
    pub manifest: Value,
    /// Source of the entry file.
    pub module_source: String,
    /// Spec version the client was generated from, when known.
    pub spec_version_id: Option<Uuid>,
    /// Owning project, when known.
    pub project_id: Option<Uuid>,
}

impl PackageBundle {
    /// Bundle a built manifest with client code.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Manifest`] if the manifest cannot be converted
    /// to JSON.
    pub fn new(manifest: &PackageManifest, module_source: impl Into<String>) -> PublishResult<Self> {
        Ok(Self {
            manifest: serde_json::to_value(manifest)?,
            module_source: module_source.into(),
            spec_version_id: None,
            project_id: None,
        })
    }

    /// Bundle a caller-supplied manifest as-is.
    #[must_use]
    pub fn raw(manifest: Value, module_source: impl Into<String>) -> Self {
        Self {
            manifest,
            module_source: module_source.into(),
            spec_version_id: None,
            project_id: None,
        }
    }

    /// Attach the spec version and project the package belongs to.
    #[must_use]
    pub const fn for_version(mut self, project_id: Uuid, spec_version_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self.spec_version_id = Some(spec_version_id);
        self
    }
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PublishReceipt {
    /// Standard output of the publish command, or a dispatch summary.
    pub output: String,
    /// Informational diagnostics that were tolerated.
    pub notices: Vec<String>,
}

/// Ships a package somewhere.
#[async_trait]
pub trait PackagePublisher: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Publish `bundle`.
    async fn publish(&self, bundle: &PackageBundle) -> PublishResult<PublishReceipt>;
}

/// Build the publisher selected by configuration.
///
/// # Errors
///
/// Returns an error if the dispatch backend is selected without credentials
/// or its HTTP client cannot be built.
pub fn publisher_from_config(config: &Config) -> PublishResult<Arc<dyn PackagePublisher>> {
    match config.publish.backend {
        PublishBackend::Npm => Ok(Arc::new(NpmPublisher::from_config(&config.publish))),
        PublishBackend::GithubDispatch => {
            Ok(Arc::new(GithubDispatchPublisher::from_config(&config.dispatch)?))
        }
    }
}

// ============================================================================
// npm
// ============================================================================

/// Publishes by running the package manager in a throwaway directory.
#[derive(Debug, Clone)]
pub struct NpmPublisher {
    token: Option<String>,
    command: String,
    args: Vec<String>,
    registry_host: String,
    informational_prefixes: Vec<String>,
    workdir_prefix: String,
    scratch_root: Option<PathBuf>,
}

impl NpmPublisher {
    /// Build from the `publish` configuration section.
    #[must_use]
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            token: config.npm_token.clone(),
            command: config.npm_command.clone(),
            args: config.npm_args.clone(),
            registry_host: config.registry_host.clone(),
            informational_prefixes: config.informational_prefixes.clone(),
            workdir_prefix: config.workdir_prefix.clone(),
            scratch_root: None,
        }
    }

    /// Create working directories under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Whether a registry token is available.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    fn credentials_file(&self, token: &str) -> String {
        format!("//{}/:_authToken={token}\n", self.registry_host)
    }

    fn is_informational(&self, line: &str) -> bool {
        self.informational_prefixes
            .iter()
            .any(|prefix| line.trim_start().starts_with(prefix.as_str()))
    }

    async fn run_in(
        &self,
        dir: &Path,
        bundle: &PackageBundle,
        token: &str,
    ) -> PublishResult<PublishReceipt> {
        let manifest = serde_json::to_string_pretty(&bundle.manifest)?;
        tokio::fs::write(dir.join("package.json"), manifest)
            .await
            .map_err(PublishError::Workspace)?;
        tokio::fs::write(dir.join(ENTRY_FILE), &bundle.module_source)
            .await
            .map_err(PublishError::Workspace)?;
        tokio::fs::write(dir.join(".npmrc"), self.credentials_file(token))
            .await
            .map_err(PublishError::Workspace)?;

        info!(command = %self.command, dir = %dir.display(), "Running publish command");
        let output = Command::new(&self.command)
            .args(&self.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PublishError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            error!(code = ?output.status.code(), "Publish command failed");
            return Err(PublishError::CommandFailed {
                code: output.status.code(),
                stderr,
            });
        }

        let (notices, unexpected): (Vec<&str>, Vec<&str>) = stderr
            .lines()
            .filter(|line| !line.trim().is_empty())
            .partition(|line| self.is_informational(line));

        if !unexpected.is_empty() {
            error!(lines = unexpected.len(), "Publish command reported errors");
            return Err(PublishError::UnexpectedDiagnostics {
                stderr: unexpected.join("\n"),
            });
        }

        Ok(PublishReceipt {
            output: stdout,
            notices: notices.into_iter().map(ToString::to_string).collect(),
        })
    }
}

#[async_trait]
impl PackagePublisher for NpmPublisher {
    fn backend(&self) -> &'static str {
        "npm"
    }

    async fn publish(&self, bundle: &PackageBundle) -> PublishResult<PublishReceipt> {
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(PublishError::MissingToken)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.workdir_prefix);
        let dir = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(PublishError::Workspace)?;

        let result = self.run_in(dir.path(), bundle, token).await;

        let path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            warn!(dir = %path.display(), error = %e, "Failed to remove publish directory");
        } else {
            debug!(dir = %path.display(), "Removed publish directory");
        }

        result
    }
}

// ============================================================================
// Repository dispatch
// ============================================================================

/// Publishes by triggering a repository workflow.
#[derive(Debug, Clone)]
pub struct GithubDispatchPublisher {
    client: reqwest::Client,
    url: String,
    token: String,
    event_type: String,
}

impl GithubDispatchPublisher {
    /// Build from the `dispatch` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::MissingDispatchCredentials`] without a token or
    /// owner.
    pub fn from_config(config: &DispatchConfig) -> PublishResult<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(PublishError::MissingDispatchCredentials("token"))?;
        let owner = config
            .owner
            .as_deref()
            .filter(|o| !o.trim().is_empty())
            .ok_or(PublishError::MissingDispatchCredentials("owner"))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("specforge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}/repos/{owner}/{}/dispatches",
                config.api_base.trim_end_matches('/'),
                config.repo
            ),
            token,
            event_type: config.event_type.clone(),
        })
    }

    fn payload(&self, bundle: &PackageBundle) -> PublishResult<Value> {
        Ok(json!({
            "event_type": self.event_type,
            "client_payload": {
                "packageJson": serde_json::to_string(&bundle.manifest)?,
                "clientCode": bundle.module_source,
                "specId": bundle.spec_version_id,
                "projectId": bundle.project_id,
            }
        }))
    }
}

#[async_trait]
impl PackagePublisher for GithubDispatchPublisher {
    fn backend(&self) -> &'static str {
        "github_dispatch"
    }

    async fn publish(&self, bundle: &PackageBundle) -> PublishResult<PublishReceipt> {
        info!(url = %self.url, "Triggering publish workflow");
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&self.payload(bundle)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            error!(status = status.as_u16(), "Publish workflow dispatch rejected");
            return Err(PublishError::DispatchRejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(PublishReceipt {
            output: format!("publish workflow triggered ({status})"),
            notices: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npm_config(description: Option<&str>, author: Option<&str>) -> NpmConfig {
        NpmConfig {
            project_id: Uuid::nil(),
            package_name: "@acme/petstore".to_string(),
            version: "0.0.1".to_string(),
            description: description.map(str::to_string),
            author: author.map(str::to_string),
        }
    }

    #[test]
    fn test_manifest_defaults() {
        let manifest = PackageManifest::from_config(&npm_config(None, None), "1.0.3");
        assert_eq!(manifest.name, "@acme/petstore");
        assert_eq!(manifest.version, "1.0.3");
        assert_eq!(manifest.description, DEFAULT_DESCRIPTION);
        assert_eq!(manifest.main, "index.js");
        assert_eq!(manifest.author, "");
        assert_eq!(manifest.license, "MIT");
        assert_eq!(
            manifest.keywords,
            vec!["api", "client", "openapi", "swagger", "generated"]
        );
    }

    #[test]
    fn test_manifest_uses_spec_version_and_project_fields() {
        let manifest =
            PackageManifest::from_config(&npm_config(Some("Pets"), Some("ACME")), "2.0.0");
        assert_eq!(manifest.version, "2.0.0");
        assert_eq!(manifest.description, "Pets");
        assert_eq!(manifest.author, "ACME");
    }

    #[test]
    fn test_manifest_key_order() {
        let bundle =
            PackageBundle::new(&PackageManifest::from_config(&npm_config(None, None), "1.0.0"), "")
                .unwrap();
        let keys: Vec<&str> = bundle
            .manifest
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            keys,
            vec!["name", "version", "description", "main", "author", "license", "keywords"]
        );
    }

    #[test]
    fn test_package_name_rules() {
        for ok in ["petstore", "@acme/petstore-client", "a.b_c~d"] {
            assert!(validate_package_name(ok).is_ok(), "{ok} should be valid");
        }
        assert!(validate_package_name("").is_err());
        assert!(validate_package_name("Petstore").is_err());
        assert!(validate_package_name("pet store").is_err());
        assert!(validate_package_name("@acme").is_err());
        assert!(validate_package_name(".hidden").is_err());
        assert!(validate_package_name(&"a".repeat(215)).is_err());
        assert!(validate_package_name(&"a".repeat(214)).is_ok());
    }

    #[test]
    fn test_dispatch_requires_credentials() {
        let mut config = DispatchConfig::default();
        assert!(matches!(
            GithubDispatchPublisher::from_config(&config),
            Err(PublishError::MissingDispatchCredentials("token"))
        ));
        config.token = Some("t".to_string());
        assert!(matches!(
            GithubDispatchPublisher::from_config(&config),
            Err(PublishError::MissingDispatchCredentials("owner"))
        ));
        config.owner = Some("acme".to_string());
        let publisher = GithubDispatchPublisher::from_config(&config).unwrap();
        assert_eq!(
            publisher.url,
            "https://api.github.com/repos/acme/npm-publisher/dispatches"
        );
    }

    #[test]
    fn test_dispatch_payload_shape() {
        let config = DispatchConfig {
            token: Some("t".to_string()),
            owner: Some("acme".to_string()),
            ..DispatchConfig::default()
        };
        let publisher = GithubDispatchPublisher::from_config(&config).unwrap();
        let project = Uuid::now_v7();
        let version = Uuid::now_v7();
        let bundle = PackageBundle::raw(json!({"name": "x"}), "code();")
            .for_version(project, version);

        let payload = publisher.payload(&bundle).unwrap();
        assert_eq!(payload["event_type"], "publish-npm");
        assert_eq!(payload["client_payload"]["packageJson"], r#"{"name":"x"}"#);
        assert_eq!(payload["client_payload"]["clientCode"], "code();");
        assert_eq!(payload["client_payload"]["specId"], version.to_string());
        assert_eq!(payload["client_payload"]["projectId"], project.to_string());
    }

    #[test]
    fn test_credentials_file_format() {
        let publisher = NpmPublisher::from_config(&PublishConfig::default());
        assert_eq!(
            publisher.credentials_file("s3cret"),
            "//registry.npmjs.org/:_authToken=s3cret\n"
        );
    }

    #[test]
    fn test_informational_prefixes() {
        let publisher = NpmPublisher::from_config(&PublishConfig::default());
        assert!(publisher.is_informational("npm notice 📦  pkg@1.0.0"));
        assert!(!publisher.is_informational("npm ERR! code E403"));
        assert!(!publisher.is_informational("npm WARN deprecated"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        struct Harness {
            _root: tempfile::TempDir,
            scratch: PathBuf,
            record: PathBuf,
            script: PathBuf,
        }

        impl Harness {
            /// A fake package manager run through `sh` that copies what it
            /// sees into `record/`.
            fn new(body: &str) -> Self {
                let root = tempfile::tempdir().unwrap();
                let scratch = root.path().join("scratch");
                let record = root.path().join("record");
                std::fs::create_dir_all(&scratch).unwrap();
                std::fs::create_dir_all(&record).unwrap();

                let script = root.path().join("fake-npm.sh");
                let text = format!(
                    "pwd > '{rec}/cwd'\n\
                     cp package.json index.js .npmrc '{rec}/'\n\
                     echo \"$@\" > '{rec}/args'\n\
                     {body}\n",
                    rec = record.display()
                );
                std::fs::write(&script, text).unwrap();

                Self {
                    _root: root,
                    scratch,
                    record,
                    script,
                }
            }

            fn publisher(&self, token: Option<&str>) -> NpmPublisher {
                let config = PublishConfig {
                    npm_token: token.map(str::to_string),
                    npm_command: "sh".to_string(),
                    npm_args: vec![
                        self.script.display().to_string(),
                        "publish".to_string(),
                        "--access=public".to_string(),
                    ],
                    ..PublishConfig::default()
                };
                NpmPublisher::from_config(&config).with_scratch_root(&self.scratch)
            }

            fn read(&self, name: &str) -> String {
                std::fs::read_to_string(self.record.join(name)).unwrap()
            }

            fn scratch_is_empty(&self) -> bool {
                std::fs::read_dir(&self.scratch).unwrap().next().is_none()
            }

            fn workdir(&self) -> PathBuf {
                PathBuf::from(self.read("cwd").trim())
            }
        }

        fn bundle() -> PackageBundle {
            let manifest = PackageManifest::from_config(
                &NpmConfig {
                    project_id: Uuid::nil(),
                    package_name: "petstore-client".to_string(),
                    version: "1.0.0".to_string(),
                    description: None,
                    author: None,
                },
                "1.0.1",
            );
            PackageBundle::new(&manifest, "export const x = 1;\n").unwrap()
        }

        #[tokio::test]
        async fn test_publish_success_writes_package_and_cleans_up() {
            let harness = Harness::new(
                "echo 'npm notice Publishing to https://registry.npmjs.org/' >&2\n\
                 echo '+ petstore-client@1.0.1'",
            );
            let receipt = harness
                .publisher(Some("s3cret"))
                .publish(&bundle())
                .await
                .unwrap();

            assert_eq!(receipt.output.trim(), "+ petstore-client@1.0.1");
            assert_eq!(receipt.notices.len(), 1);

            assert_eq!(
                harness.read(".npmrc"),
                "//registry.npmjs.org/:_authToken=s3cret\n"
            );
            assert_eq!(harness.read("index.js"), "export const x = 1;\n");
            let manifest: Value = serde_json::from_str(&harness.read("package.json")).unwrap();
            assert_eq!(manifest["version"], "1.0.1");
            assert!(harness.read("package.json").contains("\n  \"name\""));
            assert_eq!(harness.read("args").trim(), "publish --access=public");

            let workdir = harness.workdir();
            assert!(workdir
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("npm-publish-"));
            assert!(!workdir.exists());
            assert!(harness.scratch_is_empty());
        }

        #[tokio::test]
        async fn test_unexpected_stderr_is_error_and_cleans_up() {
            let harness = Harness::new(
                "echo 'npm notice fine' >&2\n\
                 echo 'npm ERR! 403 Forbidden' >&2",
            );
            let err = harness
                .publisher(Some("s3cret"))
                .publish(&bundle())
                .await
                .unwrap_err();

            match err {
                PublishError::UnexpectedDiagnostics { stderr } => {
                    assert_eq!(stderr, "npm ERR! 403 Forbidden");
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(!harness.workdir().exists());
            assert!(harness.scratch_is_empty());
        }

        #[tokio::test]
        async fn test_nonzero_exit_is_error_and_cleans_up() {
            let harness = Harness::new("echo 'boom' >&2\nexit 3");
            let err = harness
                .publisher(Some("s3cret"))
                .publish(&bundle())
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                PublishError::CommandFailed { code: Some(3), .. }
            ));
            assert!(!harness.workdir().exists());
            assert!(harness.scratch_is_empty());
        }

        #[tokio::test]
        async fn test_missing_token_creates_nothing() {
            let harness = Harness::new("true");
            let err = harness
                .publisher(None)
                .publish(&bundle())
                .await
                .unwrap_err();

            assert!(matches!(err, PublishError::MissingToken));
            assert!(err.is_config_missing());
            assert!(harness.scratch_is_empty());
        }

        #[tokio::test]
        async fn test_spawn_failure_cleans_up() {
            let harness = Harness::new("true");
            let config = PublishConfig {
                npm_token: Some("s3cret".to_string()),
                npm_command: "/nonexistent/specforge-npm".to_string(),
                ..PublishConfig::default()
            };
            let publisher = NpmPublisher::from_config(&config).with_scratch_root(&harness.scratch);

            let err = publisher.publish(&bundle()).await.unwrap_err();
            assert!(matches!(err, PublishError::Spawn { .. }));
            assert!(harness.scratch_is_empty());
        }
    }
}
