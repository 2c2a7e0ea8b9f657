//!
//! wardbook embedded database
//! --------------------------
//! One SQLite file holds the identity table and the three record tables.
//! The connection is wrapped in a `SharedDb` handle that is cloned into the
//! credential and record stores; `parking_lot::Mutex` serializes writers so
//! every mutation is a single transaction against one connection.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::StoreError;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    credential_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS patients (
    patient_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    age INTEGER NOT NULL,
    gender TEXT NOT NULL,
    contact TEXT,
    registered_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS doctors (
    doctor_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    specialty TEXT NOT NULL,
    contact TEXT
);

CREATE TABLE IF NOT EXISTS appointments (
    appointment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(patient_id),
    doctor_id INTEGER NOT NULL REFERENCES doctors(doctor_id),
    appointment_date TEXT NOT NULL,
    status TEXT NOT NULL,
    diagnosis TEXT
);
CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id);
CREATE INDEX IF NOT EXISTS idx_appointments_doctor ON appointments(doctor_id);
";

/// Shared handle to the single embedded database connection.
#[derive(Clone)]
pub struct SharedDb(pub Arc<Mutex<Connection>>);

impl SharedDb {
    /// Open (or create) the database file and apply the schema idempotently.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| StoreError::ConnectionFailure(format!("create {}: {}", dir.display(), e)))?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::ConnectionFailure(e.to_string()))?;
        init_schema(&conn)?;
        Ok(SharedDb(Arc::new(Mutex::new(conn))))
    }

    /// In-memory database for tests and benches.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::ConnectionFailure(e.to_string()))?;
        init_schema(&conn)?;
        Ok(SharedDb(Arc::new(Mutex::new(conn))))
    }

    /// Row counts for the startup inventory log: (users, patients, doctors, appointments).
    pub fn table_counts(&self) -> Result<(i64, i64, i64, i64), StoreError> {
        let conn = self.0.lock();
        let count = |table: &str| -> Result<i64, StoreError> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
                .map_err(map_query_err)
        };
        Ok((count("users")?, count("patients")?, count("doctors")?, count("appointments")?))
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )
    .map_err(|e| StoreError::ConnectionFailure(e.to_string()))?;
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| StoreError::QueryFailure(e.to_string()))?;
    Ok(())
}

/// Standard mapping for statement-level failures.
pub fn map_query_err(e: rusqlite::Error) -> StoreError {
    StoreError::QueryFailure(e.to_string())
}

/// True when the error is SQLite's unique/FK constraint violation.
pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
