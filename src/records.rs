//!
//! wardbook record store
//! ---------------------
//! Create/read access to the patient, doctor and appointment tables. The
//! store performs no authorization itself: every frontend call into it is
//! preceded by a `Session::permit` check.

use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::db::{map_query_err, SharedDb};
use crate::error::{RecordError, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: i64,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub contact: Option<String>,
    pub registered_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub doctor_id: i64,
    pub name: String,
    pub specialty: String,
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub appointment_date: String,
    pub status: String,
    pub diagnosis: Option<String>,
}

/// One row of the joined appointments view: the appointment plus the patient
/// and doctor display names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentJoined {
    pub appointment_id: i64,
    pub patient: String,
    pub doctor: String,
    pub appointment_date: String,
    pub status: String,
    pub diagnosis: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_patients: i64,
    pub total_doctors: i64,
    pub total_appointments: i64,
}

#[derive(Clone)]
pub struct RecordStore {
    db: SharedDb,
}

impl RecordStore {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    pub fn create_patient(&self, name: &str, age: i64, gender: &str, contact: Option<&str>) -> Result<i64, RecordError> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.db.0.lock();
        conn.execute(
            "INSERT INTO patients (name, age, gender, contact, registered_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![name, age, gender, contact, now],
        )
        .map_err(|e| RecordError::Store(map_query_err(e)))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn create_doctor(&self, name: &str, specialty: &str, contact: Option<&str>) -> Result<i64, RecordError> {
        let conn = self.db.0.lock();
        conn.execute(
            "INSERT INTO doctors (name, specialty, contact) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, specialty, contact],
        )
        .map_err(|e| RecordError::Store(map_query_err(e)))?;
        Ok(conn.last_insert_rowid())
    }

    /// Create an appointment. The referenced patient and doctor are checked
    /// first so a bad id surfaces as a user-level error instead of a raw
    /// foreign-key failure.
    pub fn create_appointment(
        &self,
        patient_id: i64,
        doctor_id: i64,
        appointment_date: &str,
        status: &str,
        diagnosis: Option<&str>,
    ) -> Result<i64, RecordError> {
        let conn = self.db.0.lock();
        let patient_exists: Option<i64> = conn
            .query_row("SELECT 1 FROM patients WHERE patient_id = ?1", [patient_id], |r| r.get(0))
            .optional()
            .map_err(|e| RecordError::Store(map_query_err(e)))?;
        if patient_exists.is_none() {
            return Err(RecordError::UnknownPatient(patient_id));
        }
        let doctor_exists: Option<i64> = conn
            .query_row("SELECT 1 FROM doctors WHERE doctor_id = ?1", [doctor_id], |r| r.get(0))
            .optional()
            .map_err(|e| RecordError::Store(map_query_err(e)))?;
        if doctor_exists.is_none() {
            return Err(RecordError::UnknownDoctor(doctor_id));
        }
        conn.execute(
            "INSERT INTO appointments (patient_id, doctor_id, appointment_date, status, diagnosis)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![patient_id, doctor_id, appointment_date, status, diagnosis],
        )
        .map_err(|e| RecordError::Store(map_query_err(e)))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        let conn = self.db.0.lock();
        let mut stmt = conn
            .prepare("SELECT patient_id, name, age, gender, contact, registered_at FROM patients ORDER BY patient_id")
            .map_err(map_query_err)?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Patient {
                    patient_id: r.get(0)?,
                    name: r.get(1)?,
                    age: r.get(2)?,
                    gender: r.get(3)?,
                    contact: r.get(4)?,
                    registered_at: r.get(5)?,
                })
            })
            .map_err(map_query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_query_err)
    }

    pub fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let conn = self.db.0.lock();
        let mut stmt = conn
            .prepare("SELECT doctor_id, name, specialty, contact FROM doctors ORDER BY doctor_id")
            .map_err(map_query_err)?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Doctor {
                    doctor_id: r.get(0)?,
                    name: r.get(1)?,
                    specialty: r.get(2)?,
                    contact: r.get(3)?,
                })
            })
            .map_err(map_query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_query_err)
    }

    /// The appointments view the dashboard renders: appointment fields joined
    /// with patient and doctor names.
    pub fn list_appointments_joined(&self) -> Result<Vec<AppointmentJoined>, StoreError> {
        let conn = self.db.0.lock();
        let mut stmt = conn
            .prepare(
                "SELECT a.appointment_id, p.name, d.name, a.appointment_date, a.status, a.diagnosis
                 FROM appointments a
                 JOIN patients p ON a.patient_id = p.patient_id
                 JOIN doctors d ON a.doctor_id = d.doctor_id
                 ORDER BY a.appointment_id",
            )
            .map_err(map_query_err)?;
        let rows = stmt
            .query_map([], |r| {
                Ok(AppointmentJoined {
                    appointment_id: r.get(0)?,
                    patient: r.get(1)?,
                    doctor: r.get(2)?,
                    appointment_date: r.get(3)?,
                    status: r.get(4)?,
                    diagnosis: r.get(5)?,
                })
            })
            .map_err(map_query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_query_err)
    }

    pub fn report_summary(&self) -> Result<ReportSummary, StoreError> {
        let conn = self.db.0.lock();
        let count = |table: &str| -> Result<i64, StoreError> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
                .map_err(map_query_err)
        };
        Ok(ReportSummary {
            total_patients: count("patients")?,
            total_doctors: count("doctors")?,
            total_appointments: count("appointments")?,
        })
    }
}
