//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ArtifactStore trait.

use crate::run::{Artifact, CaptureOutcome, FailureKind, RunId, RunRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ArtifactStore, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const STATUS_CAPTURED: &str = "captured";
const STATUS_FAILED: &str = "failed";

/// SQLite storage backend
///
/// The connection is guarded by a mutex so a single store can be shared by
/// concurrent crawls behind an `Arc`.
pub struct SqliteArtifactStore {
    conn: Mutex<Connection>,
}

/// Artifact row as read from the database, before validation
struct ArtifactRow {
    position: i64,
    file_name: String,
    source_url: String,
    status: String,
    failure_kind: Option<String>,
    failure_message: Option<String>,
}

impl SqliteArtifactStore {
    /// Opens (or creates) the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteArtifactStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))
    }

    fn insert_record(conn: &mut Connection, record: &RunRecord) -> StorageResult<()> {
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO runs (id, start_url, requested_link_count, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.run_id.as_str(),
                record.start_url,
                record.requested_link_count as i64,
                record.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StorageError::DuplicateRun(record.run_id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO artifacts (run_id, position, file_name, source_url, status, failure_kind, failure_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for artifact in &record.artifacts {
                let (status, kind, message) = match &artifact.outcome {
                    CaptureOutcome::Captured => (STATUS_CAPTURED, None, None),
                    CaptureOutcome::Failed { kind, message } => {
                        (STATUS_FAILED, Some(kind.to_db_string()), Some(message.as_str()))
                    }
                };

                stmt.execute(params![
                    record.run_id.as_str(),
                    artifact.index as i64,
                    artifact.file_name,
                    artifact.source_url,
                    status,
                    kind,
                    message
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn artifact_from_row(run_id: &RunId, row: ArtifactRow) -> StorageResult<Artifact> {
        let index = usize::try_from(row.position).map_err(|_| StorageError::Corrupt {
            run_id: run_id.clone(),
            message: format!("negative artifact position {}", row.position),
        })?;

        match row.status.as_str() {
            STATUS_CAPTURED => Ok(Artifact::captured(index, row.file_name, row.source_url)),
            STATUS_FAILED => {
                let kind = row
                    .failure_kind
                    .as_deref()
                    .and_then(FailureKind::from_db_string)
                    .ok_or_else(|| StorageError::Corrupt {
                        run_id: run_id.clone(),
                        message: format!("unknown failure kind {:?}", row.failure_kind),
                    })?;
                Ok(Artifact::failed(
                    index,
                    row.file_name,
                    row.source_url,
                    kind,
                    row.failure_message.unwrap_or_default(),
                ))
            }
            other => Err(StorageError::Corrupt {
                run_id: run_id.clone(),
                message: format!("unknown artifact status '{}'", other),
            }),
        }
    }
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    async fn put(&self, record: &RunRecord) -> StorageResult<()> {
        let mut conn = self.lock()?;
        Self::insert_record(&mut conn, record)
    }

    async fn get(&self, run_id: &RunId) -> StorageResult<Option<RunRecord>> {
        let conn = self.lock()?;

        let run: Option<(String, i64, String)> = conn
            .query_row(
                "SELECT start_url, requested_link_count, created_at FROM runs WHERE id = ?1",
                params![run_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (start_url, requested_link_count, created_at) = match run {
            Some(run) => run,
            None => return Ok(None),
        };

        let mut stmt = conn.prepare(
            "SELECT position, file_name, source_url, status, failure_kind, failure_message
             FROM artifacts WHERE run_id = ?1 ORDER BY position ASC",
        )?;

        let rows = stmt
            .query_map(params![run_id.as_str()], |row| {
                Ok(ArtifactRow {
                    position: row.get(0)?,
                    file_name: row.get(1)?,
                    source_url: row.get(2)?,
                    status: row.get(3)?,
                    failure_kind: row.get(4)?,
                    failure_message: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let artifacts = rows
            .into_iter()
            .map(|row| Self::artifact_from_row(run_id, row))
            .collect::<StorageResult<Vec<_>>>()?;

        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| StorageError::Corrupt {
                run_id: run_id.clone(),
                message: format!("invalid created_at '{}': {}", created_at, e),
            })?
            .with_timezone(&Utc);

        Ok(Some(RunRecord {
            run_id: run_id.clone(),
            start_url,
            requested_link_count: usize::try_from(requested_link_count).unwrap_or_default(),
            artifacts,
            created_at,
        }))
    }
}
