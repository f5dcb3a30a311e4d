//! Persistent storage for projects, spec history, npm settings and clients.
//!
//! Backed by a single SQLite database. The [`Store`] handle is cheap to clone
//! and serializes access to the connection; no call holds the lock across an
//! `.await`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{GeneratedClient, NpmConfig, Project, SpecVersion, Specification};
use crate::version::{VersionAllocator, VersionError};

/// Database schema, applied on every open.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS specifications (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    file_content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    version TEXT
);

CREATE TABLE IF NOT EXISTS spec_versions (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    spec_id TEXT NOT NULL REFERENCES specifications(id) ON DELETE CASCADE,
    version TEXT NOT NULL,
    file_content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    is_published INTEGER NOT NULL DEFAULT 0,
    client_ready INTEGER NOT NULL DEFAULT 0,
    published_at TEXT,
    publish_error TEXT
);

CREATE TABLE IF NOT EXISTS npm_configs (
    project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
    package_name TEXT NOT NULL,
    version TEXT NOT NULL,
    description TEXT,
    author TEXT
);

CREATE TABLE IF NOT EXISTS generated_clients (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    spec_version_id TEXT NOT NULL REFERENCES spec_versions(id) ON DELETE CASCADE,
    client_code TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);
CREATE INDEX IF NOT EXISTS idx_specifications_project ON specifications(project_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_spec_versions_project ON spec_versions(project_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_clients_project ON generated_clients(project_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_clients_version ON generated_clients(spec_version_id, created_at DESC);
";

const SPEC_VERSION_COLUMNS: &str = "id, project_id, spec_id, version, file_content, created_at, \
     is_published, client_ready, published_at, publish_error";

const CLIENT_COLUMNS: &str = "id, project_id, spec_version_id, client_code, created_at";

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected a statement.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A row that must exist does not.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of row that was looked up.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The stored history contains an unusable version string.
    #[error("cannot allocate next version: {0}")]
    Version(#[from] VersionError),

    /// Failed to create the database directory.
    #[error("failed to create database directory {}: {source}", .path.display())]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Another thread panicked while holding the connection.
    #[error("database connection lock was poisoned")]
    LockPoisoned,
}

/// Result alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result of recording an upload: the updated pointer and the new version.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    /// The project's specification pointer after the upload.
    pub specification: Specification,
    /// The newly appended version row.
    pub version: SpecVersion,
}

/// Result of recording a generated client: the new client and its version.
#[derive(Debug, Clone)]
pub struct RecordedClient {
    /// The appended client row.
    pub client: GeneratedClient,
    /// The version row, now `client_ready`.
    pub version: SpecVersion,
}

/// SQLite-backed store. Clones share one connection.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the default database location.
    ///
    /// Uses the platform data directory, e.g. `~/.local/share/specforge/`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "specforge").map_or_else(
            || PathBuf::from("specforge.db"),
            |dirs| dirs.data_dir().join("specforge.db"),
        )
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }

    /// Run a trivial query to confirm the database answers.
    pub fn ping(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
    }

    // ------------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------------

    /// Create a project owned by `owner_id`.
    pub fn create_project(&self, name: &str, owner_id: &str) -> StoreResult<Project> {
        let project = Project {
            id: Uuid::now_v7(),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (id, name, owner_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    project.id.to_string(),
                    project.name,
                    project.owner_id,
                    timestamp(&project.created_at)
                ],
            )?;
            Ok(())
        })?;
        Ok(project)
    }

    /// Fetch a project by id.
    pub fn get_project(&self, id: Uuid) -> StoreResult<Project> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, owner_id, created_at FROM projects WHERE id = ?1",
                params![id.to_string()],
                project_from_row,
            )
            .optional()?
            .ok_or_else(|| not_found("project", id))
        })
    }

    /// List projects owned by `owner_id`, newest first.
    pub fn list_projects(&self, owner_id: &str) -> StoreResult<Vec<Project>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, name, owner_id, created_at FROM projects
                 WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt.query_map(params![owner_id], project_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    // ------------------------------------------------------------------------
    // Specifications and versions
    // ------------------------------------------------------------------------

    /// The project's current specification pointer, if any upload happened.
    pub fn current_specification(&self, project_id: Uuid) -> StoreResult<Option<Specification>> {
        self.with_conn(|conn| current_specification(conn, project_id))
    }

    /// Append a new version for `content` and move the pointer to it.
    ///
    /// The next version is allocated from the stored history inside the same
    /// transaction as the insert.
    pub fn record_upload(
        &self,
        project_id: Uuid,
        content: &str,
        allocator: &VersionAllocator,
    ) -> StoreResult<RecordedUpload> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            let history = version_history(&tx, project_id)?;
            let version = allocator.next(&history)?;
            let now = Utc::now();

            let specification = match current_specification(&tx, project_id)? {
                Some(mut spec) => {
                    tx.execute(
                        "UPDATE specifications SET file_content = ?1, version = ?2 WHERE id = ?3",
                        params![content, version, spec.id.to_string()],
                    )?;
                    spec.file_content = content.to_string();
                    spec.version = Some(version.clone());
                    spec
                }
                None => {
                    let spec = Specification {
                        id: Uuid::now_v7(),
                        project_id,
                        file_content: content.to_string(),
                        created_at: now,
                        version: Some(version.clone()),
                    };
                    tx.execute(
                        "INSERT INTO specifications (id, project_id, file_content, created_at, version)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            spec.id.to_string(),
                            project_id.to_string(),
                            spec.file_content,
                            timestamp(&spec.created_at),
                            spec.version
                        ],
                    )?;
                    spec
                }
            };

            let row = SpecVersion {
                id: Uuid::now_v7(),
                project_id,
                spec_id: specification.id,
                version,
                file_content: content.to_string(),
                created_at: now,
                is_published: false,
                client_ready: false,
                published_at: None,
                publish_error: None,
            };
            tx.execute(
                "INSERT INTO spec_versions (id, project_id, spec_id, version, file_content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.id.to_string(),
                    project_id.to_string(),
                    row.spec_id.to_string(),
                    row.version,
                    row.file_content,
                    timestamp(&row.created_at)
                ],
            )?;

            tx.commit()?;
            Ok(RecordedUpload {
                specification,
                version: row,
            })
        })
    }

    /// All versions of a project, newest first.
    pub fn list_versions(&self, project_id: Uuid) -> StoreResult<Vec<SpecVersion>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SPEC_VERSION_COLUMNS} FROM spec_versions
                 WHERE project_id = ?1 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params![project_id.to_string()], spec_version_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Fetch one version by id.
    pub fn get_version(&self, id: Uuid) -> StoreResult<SpecVersion> {
        self.with_conn(|conn| get_version(conn, id))
    }

    /// Mark a version as published. Clears any earlier publish failure.
    pub fn mark_published(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<SpecVersion> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE spec_versions SET is_published = 1, published_at = ?1, publish_error = NULL
                 WHERE id = ?2",
                params![timestamp(&at), id.to_string()],
            )?;
            if changed == 0 {
                return Err(not_found("spec version", id));
            }
            get_version(conn, id)
        })
    }

    /// Remember why the last publish attempt for a version failed.
    ///
    /// Does not touch `is_published`, so a published version stays published.
    pub fn record_publish_failure(&self, id: Uuid, message: &str) -> StoreResult<SpecVersion> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE spec_versions SET publish_error = ?1 WHERE id = ?2",
                params![message, id.to_string()],
            )?;
            if changed == 0 {
                return Err(not_found("spec version", id));
            }
            get_version(conn, id)
        })
    }

    // ------------------------------------------------------------------------
    // Generated clients
    // ------------------------------------------------------------------------

    /// Store generated client code for a version and mark the version ready.
    ///
    /// A new client supersedes any earlier publish failure, so the version's
    /// `publish_error` is cleared. Both writes share one transaction.
    pub fn record_client(
        &self,
        project_id: Uuid,
        spec_version_id: Uuid,
        client_code: &str,
    ) -> StoreResult<RecordedClient> {
        let client = GeneratedClient {
            id: Uuid::now_v7(),
            project_id,
            spec_version_id,
            client_code: client_code.to_string(),
            created_at: Utc::now(),
        };
        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE spec_versions SET client_ready = 1, publish_error = NULL WHERE id = ?1",
                params![spec_version_id.to_string()],
            )?;
            if changed == 0 {
                return Err(not_found("spec version", spec_version_id));
            }
            tx.execute(
                "INSERT INTO generated_clients (id, project_id, spec_version_id, client_code, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    client.id.to_string(),
                    project_id.to_string(),
                    spec_version_id.to_string(),
                    client.client_code,
                    timestamp(&client.created_at)
                ],
            )?;
            let version = get_version(&tx, spec_version_id)?;

            tx.commit()?;
            Ok(RecordedClient { client, version })
        })
    }

    /// The most recent clients of a project, newest first.
    pub fn latest_clients(&self, project_id: Uuid, limit: usize) -> StoreResult<Vec<GeneratedClient>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CLIENT_COLUMNS} FROM generated_clients
                 WHERE project_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params![project_id.to_string(), limit], client_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// The most recent client of a project.
    pub fn latest_client(&self, project_id: Uuid) -> StoreResult<Option<GeneratedClient>> {
        Ok(self.latest_clients(project_id, 1)?.into_iter().next())
    }

    /// The most recent client generated from a specific version.
    pub fn latest_client_for_version(
        &self,
        spec_version_id: Uuid,
    ) -> StoreResult<Option<GeneratedClient>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CLIENT_COLUMNS} FROM generated_clients
                 WHERE spec_version_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            );
            Ok(conn
                .query_row(&sql, params![spec_version_id.to_string()], client_from_row)
                .optional()?)
        })
    }

    // ------------------------------------------------------------------------
    // npm configuration
    // ------------------------------------------------------------------------

    /// The project's npm settings, if saved.
    pub fn get_npm_config(&self, project_id: Uuid) -> StoreResult<Option<NpmConfig>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT project_id, package_name, version, description, author
                     FROM npm_configs WHERE project_id = ?1",
                    params![project_id.to_string()],
                    npm_config_from_row,
                )
                .optional()?)
        })
    }

    /// Insert or replace the project's npm settings.
    pub fn upsert_npm_config(&self, config: &NpmConfig) -> StoreResult<NpmConfig> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO npm_configs (project_id, package_name, version, description, author)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(project_id) DO UPDATE SET
                    package_name = excluded.package_name,
                    version = excluded.version,
                    description = excluded.description,
                    author = excluded.author",
                params![
                    config.project_id.to_string(),
                    config.package_name,
                    config.version,
                    config.description,
                    config.author
                ],
            )?;
            Ok(())
        })?;
        Ok(config.clone())
    }
}

// ============================================================================
// Connection-level helpers
// ============================================================================

fn current_specification(conn: &Connection, project_id: Uuid) -> StoreResult<Option<Specification>> {
    Ok(conn
        .query_row(
            "SELECT id, project_id, file_content, created_at, version FROM specifications
             WHERE project_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
            params![project_id.to_string()],
            |row| {
                Ok(Specification {
                    id: uuid_col(row, 0)?,
                    project_id: uuid_col(row, 1)?,
                    file_content: row.get(2)?,
                    created_at: time_col(row, 3)?,
                    version: row.get(4)?,
                })
            },
        )
        .optional()?)
}

fn version_history(conn: &Connection, project_id: Uuid) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT version FROM spec_versions WHERE project_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![project_id.to_string()], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

fn get_version(conn: &Connection, id: Uuid) -> StoreResult<SpecVersion> {
    let sql = format!("SELECT {SPEC_VERSION_COLUMNS} FROM spec_versions WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], spec_version_from_row)
        .optional()?
        .ok_or_else(|| not_found("spec version", id))
}

fn not_found(entity: &'static str, id: Uuid) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_time(&raw, idx)
}

fn opt_time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_time(&s, idx)).transpose()
}

fn parse_time(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        created_at: time_col(row, 3)?,
    })
}

fn spec_version_from_row(row: &Row<'_>) -> rusqlite::Result<SpecVersion> {
    Ok(SpecVersion {
        id: uuid_col(row, 0)?,
        project_id: uuid_col(row, 1)?,
        spec_id: uuid_col(row, 2)?,
        version: row.get(3)?,
        file_content: row.get(4)?,
        created_at: time_col(row, 5)?,
        is_published: row.get(6)?,
        client_ready: row.get(7)?,
        published_at: opt_time_col(row, 8)?,
        publish_error: row.get(9)?,
    })
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<GeneratedClient> {
    Ok(GeneratedClient {
        id: uuid_col(row, 0)?,
        project_id: uuid_col(row, 1)?,
        spec_version_id: uuid_col(row, 2)?,
        client_code: row.get(3)?,
        created_at: time_col(row, 4)?,
    })
}

fn npm_config_from_row(row: &Row<'_>) -> rusqlite::Result<NpmConfig> {
    Ok(NpmConfig {
        project_id: uuid_col(row, 0)?,
        package_name: row.get(1)?,
        version: row.get(2)?,
        description: row.get(3)?,
        author: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LifecycleState;

    fn store_with_project() -> (Store, Project) {
        let store = Store::open_in_memory().unwrap();
        let project = store.create_project("Petstore", "user-1").unwrap();
        (store, project)
    }

    #[test]
    fn test_project_round_trip() {
        let (store, project) = store_with_project();
        let fetched = store.get_project(project.id).unwrap();
        assert_eq!(fetched.id, project.id);
        assert_eq!(fetched.name, "Petstore");
        assert_eq!(fetched.owner_id, "user-1");
        // Stored with microsecond precision.
        assert_eq!(
            fetched.created_at.timestamp_micros(),
            project.created_at.timestamp_micros()
        );
        assert_eq!(store.list_projects("user-1").unwrap().len(), 1);
        assert!(store.list_projects("someone-else").unwrap().is_empty());
    }

    #[test]
    fn test_ping() {
        let store = Store::open_in_memory().unwrap();
        store.ping().unwrap();
    }

    #[test]
    fn test_missing_project_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store.get_project(Uuid::now_v7()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "project", .. }));
    }

    #[test]
    fn test_uploads_allocate_versions_and_move_pointer() {
        let (store, project) = store_with_project();
        let allocator = VersionAllocator::default();

        let first = store.record_upload(project.id, "a: 1", &allocator).unwrap();
        assert_eq!(first.version.version, "1.0.0");
        assert_eq!(first.specification.version.as_deref(), Some("1.0.0"));

        let second = store.record_upload(project.id, "a: 2", &allocator).unwrap();
        assert_eq!(second.version.version, "1.0.1");
        assert_eq!(second.specification.id, first.specification.id);

        let current = store.current_specification(project.id).unwrap().unwrap();
        assert_eq!(current.file_content, "a: 2");
        assert_eq!(current.version.as_deref(), Some("1.0.1"));

        let versions = store.list_versions(project.id).unwrap();
        let numbers: Vec<&str> = versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(numbers, vec!["1.0.1", "1.0.0"]);
        assert!(versions.iter().all(|v| !v.client_ready && !v.is_published));
    }

    #[test]
    fn test_publish_flags() {
        let (store, project) = store_with_project();
        let upload = store
            .record_upload(project.id, "a: 1", &VersionAllocator::default())
            .unwrap();
        let id = upload.version.id;

        let recorded = store.record_client(project.id, id, "// one").unwrap();
        assert!(recorded.version.client_ready);

        let failed = store.record_publish_failure(id, "E403").unwrap();
        assert_eq!(failed.publish_error.as_deref(), Some("E403"));
        assert!(!failed.is_published);

        let published = store.mark_published(id, Utc::now()).unwrap();
        assert!(published.is_published);
        assert!(published.published_at.is_some());
        assert!(published.publish_error.is_none());
    }

    #[test]
    fn test_new_client_clears_publish_failure() {
        let (store, project) = store_with_project();
        let upload = store
            .record_upload(project.id, "a: 1", &VersionAllocator::default())
            .unwrap();
        let id = upload.version.id;

        store.record_client(project.id, id, "// one").unwrap();
        let failed = store.record_publish_failure(id, "E403").unwrap();
        assert_eq!(failed.state(), LifecycleState::PublishFailed);

        let regenerated = store.record_client(project.id, id, "// two").unwrap();
        assert!(regenerated.version.publish_error.is_none());
        assert_eq!(regenerated.version.state(), LifecycleState::ClientGenerated);
        assert_eq!(
            store.get_version(id).unwrap().state(),
            LifecycleState::ClientGenerated
        );
    }

    #[test]
    fn test_client_for_unknown_version_is_not_stored() {
        let (store, project) = store_with_project();
        let err = store
            .record_client(project.id, Uuid::now_v7(), "// orphan")
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "spec version", .. }));
        assert!(store.latest_client(project.id).unwrap().is_none());
    }

    #[test]
    fn test_clients_newest_first() {
        let (store, project) = store_with_project();
        let upload = store
            .record_upload(project.id, "a: 1", &VersionAllocator::default())
            .unwrap();
        let v = upload.version.id;

        assert!(store.latest_client(project.id).unwrap().is_none());
        store.record_client(project.id, v, "// one").unwrap();
        store.record_client(project.id, v, "// two").unwrap();

        let latest = store.latest_clients(project.id, 2).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].client_code, "// two");
        assert_eq!(latest[1].client_code, "// one");
        assert_eq!(
            store.latest_client_for_version(v).unwrap().unwrap().client_code,
            "// two"
        );
    }

    #[test]
    fn test_npm_config_upsert() {
        let (store, project) = store_with_project();
        assert!(store.get_npm_config(project.id).unwrap().is_none());

        let mut config = NpmConfig {
            project_id: project.id,
            package_name: "petstore-client".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            author: Some("ACME".to_string()),
        };
        store.upsert_npm_config(&config).unwrap();
        config.package_name = "@acme/petstore".to_string();
        store.upsert_npm_config(&config).unwrap();

        let stored = store.get_npm_config(project.id).unwrap().unwrap();
        assert_eq!(stored, config);
    }

    #[test]
    fn test_malformed_history_blocks_allocation() {
        let (store, project) = store_with_project();
        let upload = store
            .record_upload(project.id, "a: 1", &VersionAllocator::default())
            .unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE spec_versions SET version = 'banana' WHERE id = ?1",
                    params![upload.version.id.to_string()],
                )?;
                Ok(())
            })
            .unwrap();

        let err = store
            .record_upload(project.id, "a: 2", &VersionAllocator::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Version(_)));
        assert_eq!(store.list_versions(project.id).unwrap().len(), 1);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("specforge.db");
        let store = Store::open(&path).unwrap();
        store.create_project("p", "u").unwrap();
        drop(store);

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.list_projects("u").unwrap().len(), 1);
    }
}
