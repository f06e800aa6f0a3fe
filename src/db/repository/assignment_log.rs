use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use super::query::{fmt_datetime, parse_col};
use crate::db::DatabaseError;
use crate::models::PatientAssignmentLog;

/// Append one assignment event. Rows are never updated or deleted.
pub fn append_assignment_log(
    conn: &Connection,
    patient_id: i64,
    assigned_nurse_id: Option<i64>,
    assigned_by_id: Option<i64>,
    timestamp: NaiveDateTime,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patient_assignment_logs (patient_id, assigned_nurse_id, assigned_by_id, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            patient_id,
            assigned_nurse_id,
            assigned_by_id,
            fmt_datetime(&timestamp)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Oldest first.
pub fn list_assignment_logs(
    conn: &Connection,
    patient_id: i64,
) -> Result<Vec<PatientAssignmentLog>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, assigned_nurse_id, assigned_by_id, timestamp
         FROM patient_assignment_logs WHERE patient_id = ?1
         ORDER BY timestamp ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![patient_id], |row| {
        Ok(PatientAssignmentLog {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            assigned_nurse_id: row.get(2)?,
            assigned_by_id: row.get(3)?,
            timestamp: parse_col(row, 4)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}
