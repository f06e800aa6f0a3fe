use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::query::{fmt_datetime, order_by, parse_col, SqlFilter};
use crate::db::DatabaseError;
use crate::models::{
    display_name, full_name, MedicalRecord, MedicalRecordDraft, MedicalRecordFilter,
    MedicalRecordView,
};

const RECORD_SELECT: &str = "SELECT r.id, r.patient_id, r.doctor_id, r.visit_date, r.diagnosis, \
     r.symptoms, r.prescription, r.lab_results, r.notes, r.blood_pressure, r.temperature, \
     r.heart_rate, r.respiratory_rate, r.oxygen_saturation, r.created_at, r.updated_at, \
     p.first_name, p.last_name, d.first_name, d.last_name \
     FROM medical_records r \
     JOIN patients p ON p.id = r.patient_id \
     LEFT JOIN users d ON d.id = r.doctor_id";

const RECORD_ORDERING: &[(&str, &str)] = &[("visit_date", "r.visit_date")];

fn map_record_view(row: &Row<'_>) -> rusqlite::Result<MedicalRecordView> {
    let record = MedicalRecord {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        visit_date: parse_col(row, 3)?,
        diagnosis: row.get(4)?,
        symptoms: row.get(5)?,
        prescription: row.get(6)?,
        lab_results: row.get(7)?,
        notes: row.get(8)?,
        blood_pressure: row.get(9)?,
        temperature: row.get(10)?,
        heart_rate: row.get(11)?,
        respiratory_rate: row.get(12)?,
        oxygen_saturation: row.get(13)?,
        created_at: parse_col(row, 14)?,
        updated_at: parse_col(row, 15)?,
    };
    let patient_name = full_name(&row.get::<_, String>(16)?, &row.get::<_, String>(17)?);
    let doctor_first: Option<String> = row.get(18)?;
    let doctor_last: Option<String> = row.get(19)?;
    let doctor_name = record.doctor_id.map(|_| {
        display_name(
            doctor_first.as_deref().unwrap_or_default(),
            doctor_last.as_deref().unwrap_or_default(),
        )
    });
    Ok(MedicalRecordView {
        record,
        patient_name,
        doctor_name,
    })
}

pub fn insert_medical_record(
    conn: &Connection,
    draft: &MedicalRecordDraft,
    now: NaiveDateTime,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO medical_records (
            patient_id, doctor_id, visit_date, diagnosis, symptoms, prescription, lab_results,
            notes, blood_pressure, temperature, heart_rate, respiratory_rate, oxygen_saturation,
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        params![
            draft.patient_id,
            draft.doctor_id,
            fmt_datetime(&draft.visit_date),
            draft.diagnosis,
            draft.symptoms,
            draft.prescription,
            draft.lab_results,
            draft.notes,
            draft.blood_pressure,
            draft.temperature,
            draft.heart_rate,
            draft.respiratory_rate,
            draft.oxygen_saturation,
            fmt_datetime(&now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_medical_record(conn: &Connection, id: i64) -> Result<Option<MedicalRecordView>, DatabaseError> {
    let view = conn
        .query_row(
            &format!("{RECORD_SELECT} WHERE r.id = ?1"),
            params![id],
            map_record_view,
        )
        .optional()?;
    Ok(view)
}

pub fn list_medical_records(
    conn: &Connection,
    filter: &MedicalRecordFilter,
) -> Result<Vec<MedicalRecordView>, DatabaseError> {
    let mut sql = SqlFilter::new();
    sql.eq_opt("r.patient_id", filter.patient_id);
    sql.eq_opt("r.doctor_id", filter.doctor_id);
    sql.eq_opt("date(r.visit_date)", filter.visit_date.map(|d| d.to_string()));

    let query = format!(
        "{RECORD_SELECT}{}{}",
        sql.where_sql(),
        order_by(
            filter.ordering.as_deref(),
            RECORD_ORDERING,
            "r.visit_date DESC, r.id DESC",
        ),
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(sql.params().as_slice(), map_record_view)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub fn update_medical_record(
    conn: &Connection,
    id: i64,
    draft: &MedicalRecordDraft,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medical_records SET
            patient_id = ?2, doctor_id = ?3, visit_date = ?4, diagnosis = ?5, symptoms = ?6,
            prescription = ?7, lab_results = ?8, notes = ?9, blood_pressure = ?10,
            temperature = ?11, heart_rate = ?12, respiratory_rate = ?13,
            oxygen_saturation = ?14, updated_at = ?15
         WHERE id = ?1",
        params![
            id,
            draft.patient_id,
            draft.doctor_id,
            fmt_datetime(&draft.visit_date),
            draft.diagnosis,
            draft.symptoms,
            draft.prescription,
            draft.lab_results,
            draft.notes,
            draft.blood_pressure,
            draft.temperature,
            draft.heart_rate,
            draft.respiratory_rate,
            draft.oxygen_saturation,
            fmt_datetime(&now),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("MedicalRecord", id));
    }
    Ok(())
}

pub fn delete_medical_record(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM medical_records WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("MedicalRecord", id));
    }
    Ok(())
}
