//! Application configuration management.
//!
//! Configuration is layered with the `config` crate:
//! built-in defaults, then an optional TOML file, then `SPECFORGE__SECTION__KEY`
//! environment variables. Secrets also fall back to their conventional
//! variable names (`GEMINI_API_KEY`, `NPM_PUBLISH_TOKEN`, `GITHUB_TOKEN`, ...).
//!
//! [`Config::validate`] must pass before the server starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::VersionBump;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "SPECFORGE_CONFIG";

/// Prefix for layered environment overrides (`SPECFORGE__SERVER__PORT`).
pub const ENV_PREFIX: &str = "SPECFORGE";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A configuration source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A single field holds an unusable value.
    #[error("{field}: {message}")]
    ValidationError {
        /// Dotted field path, e.g. `generation.api_key`.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} configuration errors: {}", .0.len(), join_errors(.0))]
    MultipleValidationErrors(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Sections
// ============================================================================

/// Full application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener.
    pub server: ServerConfig,
    /// SQLite database.
    pub database: DatabaseConfig,
    /// Generative endpoint used to write clients.
    pub generation: GenerationConfig,
    /// Package publishing.
    pub publish: PublishConfig,
    /// Source-control dispatch endpoint (alternate publish path).
    pub dispatch: DispatchConfig,
    /// Version allocation policy.
    pub versioning: VersioningConfig,
    /// Event function endpoints.
    pub events: EventsConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Maximum accepted request body, in bytes.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: crate::storage::Store::default_path(),
        }
    }
}

/// Generative endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// API key. Falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    /// Base URL of the generative language API.
    pub api_base: String,
    /// Model name.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Generate a client right after every upload.
    pub auto_generate: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 120,
            auto_generate: true,
        }
    }
}

impl GenerationConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which executor publishes packages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishBackend {
    /// Run the package manager locally.
    #[default]
    Npm,
    /// Hand off to a source-control workflow through a dispatch event.
    GithubDispatch,
}

/// Package publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Executor to use.
    pub backend: PublishBackend,
    /// Publish automatically after a successful generation.
    pub auto_publish: bool,
    /// Registry token. Falls back to `NPM_PUBLISH_TOKEN`, then `NPM_TOKEN`.
    pub npm_token: Option<String>,
    /// Package manager executable.
    pub npm_command: String,
    /// Arguments passed to the package manager.
    pub npm_args: Vec<String>,
    /// Registry host the credential file binds the token to.
    pub registry_host: String,
    /// Stderr line prefixes that are informational rather than errors.
    pub informational_prefixes: Vec<String>,
    /// Prefix of the per-invocation working directory name.
    pub workdir_prefix: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            backend: PublishBackend::Npm,
            auto_publish: true,
            npm_token: None,
            npm_command: "npm".to_string(),
            npm_args: vec!["publish".to_string(), "--access=public".to_string()],
            registry_host: "registry.npmjs.org".to_string(),
            informational_prefixes: vec!["npm notice".to_string()],
            workdir_prefix: "npm-publish-".to_string(),
        }
    }
}

/// Repository dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// API base URL.
    pub api_base: String,
    /// Token with repo scope. Falls back to `GITHUB_TOKEN`.
    pub token: Option<String>,
    /// Repository owner. Falls back to `GITHUB_OWNER`.
    pub owner: Option<String>,
    /// Repository holding the publish workflow. Falls back to `GITHUB_REPO`.
    pub repo: String,
    /// Dispatch event type.
    pub event_type: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            owner: None,
            repo: "npm-publisher".to_string(),
            event_type: "publish-npm".to_string(),
        }
    }
}

/// Version allocation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Component incremented on each upload.
    pub bump: VersionBump,
}

/// Event function settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Shared secret expected in `x-webhook-secret`. Unset disables the check.
    pub webhook_secret: Option<String>,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSON file logs plus compact stdout instead of pretty stdout.
    pub production: bool,
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rolling log files.
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            production: false,
            level: "info".to_string(),
            directory: directories::ProjectDirs::from("", "", "specforge").map_or_else(
                || PathBuf::from("./logs"),
                |dirs| dirs.data_dir().join("logs"),
            ),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load configuration from defaults, a file and the environment.
    ///
    /// `path` overrides the file location; otherwise `SPECFORGE_CONFIG` is
    /// consulted, then the platform config directory. Only an explicitly
    /// named file must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any source fails to
    /// deserialize. Validation is separate; see [`Config::validate`].
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let file = match explicit {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path)),
            Some(path) => Some((path, true)),
            None => Self::default_path().map(|path| (path, false)),
        };

        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some((path, required)) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(required),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: Self = builder.build()?.try_deserialize()?;
        loaded.apply_env_fallbacks(|key| std::env::var(key).ok());
        Ok(loaded)
    }

    /// Default configuration file path, e.g. `~/.config/specforge/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "specforge")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Fill unset secrets from their conventional environment variables.
    pub fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.generation.api_key.is_none() {
            self.generation.api_key = get("GEMINI_API_KEY");
        }
        if self.publish.npm_token.is_none() {
            self.publish.npm_token = get("NPM_PUBLISH_TOKEN").or_else(|| get("NPM_TOKEN"));
        }
        if self.dispatch.token.is_none() {
            self.dispatch.token = get("GITHUB_TOKEN");
        }
        if self.dispatch.owner.is_none() {
            self.dispatch.owner = get("GITHUB_OWNER");
        }
        if let Some(repo) = get("GITHUB_REPO") {
            if self.dispatch.repo == DispatchConfig::default().repo {
                self.dispatch.repo = repo;
            }
        }
    }

    /// Whether the selected publish backend has its credential.
    #[must_use]
    pub fn has_publish_credential(&self) -> bool {
        let token = match self.publish.backend {
            PublishBackend::Npm => self.publish.npm_token.as_deref(),
            PublishBackend::GithubDispatch => self.dispatch.token.as_deref(),
        };
        !is_blank(token)
    }

    /// Check every field and report all problems at once.
    ///
    /// # Errors
    ///
    /// Returns the single failing field, or
    /// [`ConfigError::MultipleValidationErrors`] when several fail.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut fail = |field: &'static str, message: &str| {
            errors.push(ConfigError::ValidationError {
                field,
                message: message.to_string(),
            });
        };

        if self.server.port == 0 {
            fail("server.port", "must be between 1 and 65535");
        }
        if self.server.body_limit_bytes == 0 {
            fail("server.body_limit_bytes", "must be greater than zero");
        }

        if is_blank(self.generation.api_key.as_deref()) {
            fail(
                "generation.api_key",
                "is required (set GEMINI_API_KEY or SPECFORGE__GENERATION__API_KEY)",
            );
        }
        if !is_http_url(&self.generation.api_base) {
            fail("generation.api_base", "must be an http(s) URL");
        }
        if self.generation.model.trim().is_empty() {
            fail("generation.model", "cannot be empty");
        }
        if self.generation.timeout_secs == 0 {
            fail("generation.timeout_secs", "must be greater than zero");
        }

        if self.publish.npm_command.trim().is_empty() {
            fail("publish.npm_command", "cannot be empty");
        }
        if self.publish.npm_args.is_empty() {
            fail("publish.npm_args", "must contain at least one argument");
        }
        if self.publish.registry_host.trim().is_empty() {
            fail("publish.registry_host", "cannot be empty");
        }

        if self.publish.backend == PublishBackend::GithubDispatch {
            if is_blank(self.dispatch.token.as_deref()) {
                fail(
                    "dispatch.token",
                    "is required for the github_dispatch backend (set GITHUB_TOKEN)",
                );
            }
            if is_blank(self.dispatch.owner.as_deref()) {
                fail(
                    "dispatch.owner",
                    "is required for the github_dispatch backend (set GITHUB_OWNER)",
                );
            }
            if self.dispatch.repo.trim().is_empty() {
                fail("dispatch.repo", "cannot be empty");
            }
            if !is_http_url(&self.dispatch.api_base) {
                fail("dispatch.api_base", "must be an http(s) URL");
            }
        }

        if self.logging.level.trim().is_empty() {
            fail("logging.level", "cannot be empty");
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_credential_follows_backend() {
        let mut config = Config::default();
        assert!(!config.has_publish_credential());

        config.publish.npm_token = Some("  ".to_string());
        assert!(!config.has_publish_credential());
        config.publish.npm_token = Some("npm_abc".to_string());
        assert!(config.has_publish_credential());

        config.publish.backend = PublishBackend::GithubDispatch;
        assert!(!config.has_publish_credential());
        config.dispatch.token = Some("ghp_abc".to_string());
        assert!(config.has_publish_credential());
    }

    fn valid() -> Config {
        let mut config = Config::default();
        config.generation.api_key = Some("key".to_string());
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.publish.backend, PublishBackend::Npm);
        assert_eq!(config.publish.npm_args, vec!["publish", "--access=public"]);
        assert_eq!(config.publish.informational_prefixes, vec!["npm notice"]);
        assert_eq!(config.dispatch.repo, "npm-publisher");
        assert_eq!(config.versioning.bump, VersionBump::Patch);
        assert!(config.generation.auto_generate);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_api_key_is_single_error() {
        let err = Config::default().validate().unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "generation.api_key"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::default();
        config.server.port = 0;
        config.publish.backend = PublishBackend::GithubDispatch;

        match config.validate().unwrap_err() {
            ConfigError::MultipleValidationErrors(errors) => {
                let text: Vec<String> = errors.iter().map(ToString::to_string).collect();
                assert!(text.iter().any(|e| e.starts_with("server.port")));
                assert!(text.iter().any(|e| e.starts_with("generation.api_key")));
                assert!(text.iter().any(|e| e.starts_with("dispatch.token")));
                assert!(text.iter().any(|e| e.starts_with("dispatch.owner")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_npm_token_is_optional() {
        let config = valid();
        assert!(config.publish.npm_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_fallbacks() {
        let mut config = Config::default();
        config.apply_env_fallbacks(|key| match key {
            "GEMINI_API_KEY" => Some("gemini".to_string()),
            "NPM_TOKEN" => Some("npm-legacy".to_string()),
            "GITHUB_OWNER" => Some("acme".to_string()),
            "GITHUB_REPO" => Some("publisher".to_string()),
            "GITHUB_TOKEN" => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.generation.api_key.as_deref(), Some("gemini"));
        assert_eq!(config.publish.npm_token.as_deref(), Some("npm-legacy"));
        assert_eq!(config.dispatch.owner.as_deref(), Some("acme"));
        assert_eq!(config.dispatch.repo, "publisher");
        assert!(config.dispatch.token.is_none());
    }

    #[test]
    fn test_explicit_values_win_over_fallbacks() {
        let mut config = Config::default();
        config.publish.npm_token = Some("from-file".to_string());
        config.apply_env_fallbacks(|key| {
            (key == "NPM_PUBLISH_TOKEN").then(|| "from-env".to_string())
        });
        assert_eq!(config.publish.npm_token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 8080

[generation]
api_key = "abc"
auto_generate = false

[publish]
backend = "github_dispatch"

[versioning]
bump = "minor"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.generation.api_key.as_deref(), Some("abc"));
        assert!(!config.generation.auto_generate);
        assert_eq!(config.publish.backend, PublishBackend::GithubDispatch);
        assert_eq!(config.versioning.bump, VersionBump::Minor);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
