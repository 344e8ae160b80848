//! uidmatrix record store
//!
//! A single SQLite file holding the UniqueID Matrix rows:
//!
//! ```text
//! ┌──────────────┐   StoreBuilder (temp file + rename)   ┌──────────────────┐
//! │  importer    │──────────────────────────────────────►│  xpath_data.db   │
//! └──────────────┘                                       │  xpath_records   │
//!                                                        │  import_sources  │
//! ┌──────────────┐   RecordStore (read-only)             │                  │
//! │  resolver    │◄──────────────────────────────────────│                  │
//! └──────────────┘                                       └──────────────────┘
//! ```
//!
//! The query path only ever opens the file read-only. The write path never
//! touches the live file: it stages a complete database next to it and renames
//! it into place, so a reader sees either the old store or the new one.

pub mod predicate;
pub mod record;


pub use predicate::{fold_case, Column, Predicate};
pub use record::{derive_reference_id, normalize_xpath, Record, VersionEntry};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;

/// Default store location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "xpath_data.db";

const RECORDS_TABLE: &str = "xpath_records";

const SCHEMA_SQL: &str = r#"
CREATE TABLE xpath_records (
    sheet_source TEXT NOT NULL,
    unique_id    TEXT NOT NULL,
    name         TEXT NOT NULL,
    xpath        TEXT NOT NULL,
    reference_id TEXT NOT NULL,
    all_versions TEXT NOT NULL
);
CREATE TABLE import_sources (
    sheet_source TEXT NOT NULL,
    source_path  TEXT NOT NULL,
    row_count    INTEGER NOT NULL,
    skipped      INTEGER NOT NULL,
    sha256       TEXT NOT NULL,
    imported_at  TEXT NOT NULL
);
"#;

// Expression indexes: must match `Column::folded_sql`.
const INDEX_SQL: &str = r#"
CREATE INDEX idx_records_unique_id ON xpath_records (LOWER(unique_id));
CREATE INDEX idx_records_reference_id ON xpath_records (LOWER(reference_id));
CREATE INDEX idx_records_xpath ON xpath_records (LOWER(TRIM(xpath, '/ ')));
"#;

const SELECT_COLUMNS: &str = "sheet_source, unique_id, name, xpath, reference_id, all_versions";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record store not found at {path}")]
    Missing { path: PathBuf },
    #[error("failed to open record store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("{path} is not an initialized record store (missing `xpath_records` table)")]
    NotInitialized { path: PathBuf },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// True when the store cannot be used at all (as opposed to a failing query).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Missing { .. } | StoreError::Open { .. } | StoreError::NotInitialized { .. }
        )
    }
}

// ============================================================================
// Import metadata
// ============================================================================

/// One imported source (sheet export) as recorded in the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceImport {
    pub sheet_source: String,
    pub source_path: String,
    pub rows: usize,
    pub skipped: usize,
    /// Hex SHA-256 of the source file bytes.
    pub sha256: String,
    pub imported_at: DateTime<Utc>,
}

// ============================================================================
// Read path
// ============================================================================

/// Read-only handle over an imported store.
#[derive(Debug)]
pub struct RecordStore {
    conn: Connection,
    path: PathBuf,
}

impl RecordStore {
    /// Open an existing store read-only.
    ///
    /// Fails with [`StoreError::Missing`], [`StoreError::Open`] or
    /// [`StoreError::NotInitialized`] when the one-time import has not run.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(StoreError::Missing { path });
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;

        // SQLite opens lazily; a non-database file only fails on first read.
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [RECORDS_TABLE],
                |row| row.get(0),
            )
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;
        if tables == 0 {
            return Err(StoreError::NotInitialized { path });
        }

        tracing::debug!(path = %path.display(), "opened record store read-only");
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one exact-match predicate; rows come back in insertion order.
    ///
    /// An empty vector is a successful lookup that found nothing.
    pub fn execute(&self, predicate: &Predicate) -> Result<Vec<Record>, StoreError> {
        let started = Instant::now();
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM {RECORDS_TABLE} WHERE {} ORDER BY rowid",
            predicate.where_clause()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([predicate.value()], |row| {
                Ok(Record {
                    sheet_source: row.get(0)?,
                    unique_id: row.get(1)?,
                    name: row.get(2)?,
                    xpath: row.get(3)?,
                    reference_id: row.get(4)?,
                    version_availability: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            column = %predicate.column(),
            matches = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "executed predicate"
        );
        Ok(records)
    }

    pub fn record_count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {RECORDS_TABLE}"), [], |row| {
                row.get(0)
            })?;
        Ok(n as usize)
    }

    /// Sources recorded by the import that built this store, in import order.
    pub fn sources(&self) -> Result<Vec<SourceImport>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT sheet_source, source_path, row_count, skipped, sha256, imported_at \
             FROM import_sources ORDER BY rowid",
        )?;
        let sources = stmt
            .query_map([], |row| {
                let imported_at: String = row.get(5)?;
                let imported_at = DateTime::parse_from_rfc3339(&imported_at)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            5,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc);
                Ok(SourceImport {
                    sheet_source: row.get(0)?,
                    source_path: row.get(1)?,
                    rows: row.get::<_, i64>(2)? as usize,
                    skipped: row.get::<_, i64>(3)? as usize,
                    sha256: row.get(4)?,
                    imported_at,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }
}

// ============================================================================
// Write path
// ============================================================================

/// Builds a fresh store beside `target` and swaps it in on [`StoreBuilder::finish`].
///
/// Dropping the builder without finishing discards the staged file and leaves
/// any existing store untouched.
pub struct StoreBuilder {
    conn: Connection,
    staging: NamedTempFile,
    target: PathBuf,
    inserted: usize,
}

impl StoreBuilder {
    pub fn create(target: impl AsRef<Path>) -> Result<Self, StoreError> {
        let target = target.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let staging = tempfile::Builder::new()
            .prefix(".uidmatrix-import-")
            .suffix(".db")
            .tempfile_in(&dir)
            .map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;

        let conn = Connection::open(staging.path()).map_err(|source| StoreError::Open {
            path: staging.path().to_path_buf(),
            source,
        })?;
        conn.execute_batch(SCHEMA_SQL)?;

        tracing::debug!(
            dest = %target.display(),
            staging = %staging.path().display(),
            "staging new record store"
        );
        Ok(Self {
            conn,
            staging,
            target,
            inserted: 0,
        })
    }

    /// Insert a batch of records in one transaction.
    pub fn insert_records(&mut self, records: &[Record]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {RECORDS_TABLE} ({SELECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ))?;
            for r in records {
                stmt.execute(params![
                    r.sheet_source,
                    r.unique_id,
                    r.name,
                    r.xpath,
                    r.reference_id,
                    r.version_availability,
                ])?;
            }
        }
        tx.commit()?;
        self.inserted += records.len();
        Ok(records.len())
    }

    pub fn record_source(&mut self, source: &SourceImport) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO import_sources (sheet_source, source_path, row_count, skipped, sha256, imported_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                source.sheet_source,
                source.source_path,
                source.rows as i64,
                source.skipped as i64,
                source.sha256,
                source.imported_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Build indexes, close the staged database and move it over the target.
    pub fn finish(self) -> Result<PathBuf, StoreError> {
        let StoreBuilder {
            conn,
            staging,
            target,
            inserted,
        } = self;

        conn.execute_batch(INDEX_SQL)?;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;

        staging.persist(&target).map_err(|e| StoreError::Io {
            path: target.clone(),
            source: e.error,
        })?;

        tracing::info!(path = %target.display(), records = inserted, "record store replaced");
        Ok(target)
    }
}
