//! SQLite-backed evaluation store.
//!
//! Provides persistent storage for:
//! - The class roster (`students`)
//! - The single evaluation window record (`settings`)
//! - Submitted allocations, one row per awarded peer (`preferences`)
//!
//! The database doubles as the local backend: it implements the roster,
//! window and submission collaborators of the allocation form.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::allocation::Allocation;
use crate::error::{CoreError, DatabaseError, FetchError, SinkError};
use crate::providers::{RosterProvider, SubmissionSink, WindowProvider};
use crate::records::{Preference, StudentRecord};
use crate::roster::PeerRef;
use crate::window::EvaluationWindow;

use super::data_dir;

/// SQLite database for students, the evaluation window and preferences.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/peereval/peereval.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("peereval.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS students (
                id         TEXT PRIMARY KEY,
                full_name  TEXT NOT NULL,
                mean       REAL NOT NULL DEFAULT 0,
                alt        INTEGER NOT NULL DEFAULT 0,
                present    INTEGER NOT NULL DEFAULT 1
            );

            -- Exactly one window record
            CREATE TABLE IF NOT EXISTS settings (
                id         INTEGER PRIMARY KEY CHECK (id = 1),
                closes_at  TEXT NOT NULL,
                is_open    INTEGER NOT NULL,
                is_locked  INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS preferences (
                student_id   TEXT NOT NULL,
                preferred_id TEXT NOT NULL,
                points       REAL NOT NULL,
                submitted_at TEXT NOT NULL,
                PRIMARY KEY (student_id, preferred_id)
            );

            CREATE INDEX IF NOT EXISTS idx_preferences_preferred_id ON preferences(preferred_id);",
        )?;
        Ok(())
    }

    /// Insert a student or replace the existing record with the same id.
    pub fn upsert_student(&self, student: &StudentRecord) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO students (id, full_name, mean, alt, present)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                mean = excluded.mean,
                alt = excluded.alt,
                present = excluded.present",
            params![
                student.id,
                student.full_name,
                student.mean,
                student.alt,
                student.present
            ],
        )?;
        Ok(())
    }

    /// Remove a student. Returns whether a record existed.
    pub fn remove_student(&self, id: &str) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .execute("DELETE FROM students WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Mark a student present or absent for group formation.
    pub fn set_present(&self, id: &str, present: bool) -> Result<bool, DatabaseError> {
        let updated = self.conn.execute(
            "UPDATE students SET present = ?2 WHERE id = ?1",
            params![id, present],
        )?;
        Ok(updated > 0)
    }

    /// All students ordered by name.
    pub fn students(&self) -> Result<Vec<StudentRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, full_name, mean, alt, present FROM students ORDER BY full_name, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StudentRecord {
                id: row.get(0)?,
                full_name: row.get(1)?,
                mean: row.get(2)?,
                alt: row.get(3)?,
                present: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Replace the evaluation window record.
    pub fn set_window(&self, window: &EvaluationWindow) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO settings (id, closes_at, is_open, is_locked)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                closes_at = excluded.closes_at,
                is_open = excluded.is_open,
                is_locked = excluded.is_locked",
            params![
                window.closes_at.to_rfc3339(),
                window.is_open,
                window.is_locked
            ],
        )?;
        Ok(())
    }

    /// The evaluation window record, if one has been configured.
    pub fn window(&self) -> Result<Option<EvaluationWindow>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT closes_at, is_open, is_locked FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((closes_at, is_open, is_locked)) = row else {
            return Ok(None);
        };
        let closes_at = DateTime::parse_from_rfc3339(&closes_at)
            .map_err(|_| DatabaseError::Corrupt {
                column: "settings.closes_at".into(),
                value: closes_at.clone(),
            })?
            .with_timezone(&Utc);
        Ok(Some(EvaluationWindow {
            closes_at,
            is_open,
            is_locked,
        }))
    }

    /// Store `student_id`'s allocation, replacing any earlier one.
    pub fn record_allocation(
        &self,
        student_id: &str,
        allocation: &Allocation,
        submitted_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM preferences WHERE student_id = ?1",
            params![student_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO preferences (student_id, preferred_id, points, submitted_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let stamp = submitted_at.to_rfc3339();
            for (peer_id, points) in allocation {
                stmt.execute(params![student_id, peer_id, points, stamp])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Every stored preference line.
    pub fn preferences(&self) -> Result<Vec<Preference>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, preferred_id, points, submitted_at
             FROM preferences
             ORDER BY student_id, preferred_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut prefs = Vec::new();
        for row in rows {
            let (student_id, preferred_id, points, submitted_at) = row?;
            let submitted_at = DateTime::parse_from_rfc3339(&submitted_at)
                .map_err(|_| DatabaseError::Corrupt {
                    column: "preferences.submitted_at".into(),
                    value: submitted_at.clone(),
                })?
                .with_timezone(&Utc);
            prefs.push(Preference {
                student_id,
                preferred_id,
                points,
                submitted_at: Some(submitted_at),
            });
        }
        Ok(prefs)
    }

    fn peers_for(&self, current_user_id: &str) -> Result<Vec<PeerRef>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, full_name FROM students WHERE id != ?1 ORDER BY full_name, id",
        )?;
        let rows = stmt.query_map(params![current_user_id], |row| {
            Ok(PeerRef::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn storage_error(resource: &str, err: DatabaseError) -> FetchError {
    FetchError::Storage {
        resource: resource.to_string(),
        message: err.to_string(),
    }
}

impl RosterProvider for Database {
    async fn fetch_peers(&self, current_user_id: &str) -> Result<Vec<PeerRef>, FetchError> {
        self.peers_for(current_user_id)
            .map_err(|e| storage_error("students", e))
    }
}

impl WindowProvider for Database {
    async fn fetch_window(&self) -> Result<EvaluationWindow, FetchError> {
        self.window()
            .map_err(|e| storage_error("settings", e))?
            .ok_or_else(|| FetchError::Missing("settings".into()))
    }
}

impl SubmissionSink for Database {
    async fn submit_allocation(
        &self,
        current_user_id: &str,
        allocation: &Allocation,
    ) -> Result<(), SinkError> {
        self.record_allocation(current_user_id, allocation, Utc::now())
            .map_err(|e| SinkError::Storage(e.to_string()))
    }
}
