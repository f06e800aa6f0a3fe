use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::query::{fmt_datetime, fmt_time, order_by, parse_col, SqlFilter};
use super::sequence::next_public_id;
use crate::db::DatabaseError;
use crate::models::{
    display_name, full_name, Appointment, AppointmentDraft, AppointmentFilter, AppointmentStatus,
    AppointmentView, IdKind,
};

const APPOINTMENT_SELECT: &str = "SELECT a.id, a.appointment_id, a.patient_id, a.doctor_id, \
     a.assigned_nurse_id, a.appointment_date, a.appointment_time, a.duration, \
     a.appointment_type, a.status, a.reason, a.notes, a.created_by, a.created_at, a.updated_at, \
     p.first_name, p.last_name, p.phone, d.first_name, d.last_name \
     FROM appointments a \
     JOIN patients p ON p.id = a.patient_id \
     LEFT JOIN users d ON d.id = a.doctor_id";

const APPOINTMENT_ORDERING: &[(&str, &str)] = &[
    ("appointment_date", "a.appointment_date"),
    ("appointment_time", "a.appointment_time"),
];

const APPOINTMENT_SEARCH: &[&str] = &["a.appointment_id", "p.first_name", "p.last_name"];

fn map_appointment_view(row: &Row<'_>) -> rusqlite::Result<AppointmentView> {
    let appointment = Appointment {
        id: row.get(0)?,
        appointment_id: row.get(1)?,
        patient_id: row.get(2)?,
        doctor_id: row.get(3)?,
        assigned_nurse_id: row.get(4)?,
        appointment_date: parse_col(row, 5)?,
        appointment_time: parse_col(row, 6)?,
        duration: row.get(7)?,
        appointment_type: parse_col(row, 8)?,
        status: parse_col(row, 9)?,
        reason: row.get(10)?,
        notes: row.get(11)?,
        created_by_id: row.get(12)?,
        created_at: parse_col(row, 13)?,
        updated_at: parse_col(row, 14)?,
    };
    let patient_name = full_name(&row.get::<_, String>(15)?, &row.get::<_, String>(16)?);
    let patient_phone = row.get(17)?;
    let doctor_first: Option<String> = row.get(18)?;
    let doctor_last: Option<String> = row.get(19)?;
    let doctor_name = appointment.doctor_id.map(|_| {
        display_name(
            doctor_first.as_deref().unwrap_or_default(),
            doctor_last.as_deref().unwrap_or_default(),
        )
    });
    Ok(AppointmentView {
        appointment,
        patient_name,
        patient_phone,
        doctor_name,
    })
}

/// Allocate the next `APT-` identifier and insert the appointment.
///
/// Callers run this inside an immediate transaction. A second booking of
/// the same doctor, date and time fails with `ConstraintViolation`.
pub fn create_appointment(
    conn: &Connection,
    draft: &AppointmentDraft,
    created_by: Option<i64>,
    now: NaiveDateTime,
) -> Result<i64, DatabaseError> {
    let appointment_id = next_public_id(conn, IdKind::Appointment)?;
    conn.execute(
        "INSERT INTO appointments (
            appointment_id, patient_id, doctor_id, assigned_nurse_id, appointment_date,
            appointment_time, duration, appointment_type, status, reason, notes, created_by,
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            appointment_id,
            draft.patient_id,
            draft.doctor_id,
            draft.assigned_nurse_id,
            draft.appointment_date.to_string(),
            fmt_time(&draft.appointment_time),
            draft.duration,
            draft.appointment_type.as_str(),
            draft.status.as_str(),
            draft.reason,
            draft.notes,
            created_by,
            fmt_datetime(&now),
        ],
    )?;
    tracing::debug!(appointment_id = %appointment_id, "appointment inserted");
    Ok(conn.last_insert_rowid())
}

pub fn get_appointment(conn: &Connection, id: i64) -> Result<Option<AppointmentView>, DatabaseError> {
    let view = conn
        .query_row(
            &format!("{APPOINTMENT_SELECT} WHERE a.id = ?1"),
            params![id],
            map_appointment_view,
        )
        .optional()?;
    Ok(view)
}

pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> Result<Vec<AppointmentView>, DatabaseError> {
    let mut sql = SqlFilter::new();
    sql.eq_opt("a.status", filter.status.map(|s| s.as_str()));
    sql.any_of(
        "a.status",
        filter.statuses.iter().map(|s| s.as_str().to_string()).collect(),
    );
    sql.eq_opt(
        "a.appointment_type",
        filter.appointment_type.map(|t| t.as_str()),
    );
    sql.eq_opt("a.doctor_id", filter.doctor_id);
    sql.eq_opt("a.patient_id", filter.patient_id);
    sql.eq_opt("a.assigned_nurse_id", filter.assigned_nurse_id);
    sql.eq_opt(
        "a.appointment_date",
        filter.appointment_date.map(|d| d.to_string()),
    );
    if let Some(from) = filter.date_from {
        sql.gte("a.appointment_date", from.to_string());
    }
    sql.search(APPOINTMENT_SEARCH, filter.search.as_deref());

    let query = format!(
        "{APPOINTMENT_SELECT}{}{}",
        sql.where_sql(),
        order_by(
            filter.ordering.as_deref(),
            APPOINTMENT_ORDERING,
            "a.appointment_date ASC, a.appointment_time ASC, a.id ASC",
        ),
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(sql.params().as_slice(), map_appointment_view)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub fn update_appointment(
    conn: &Connection,
    id: i64,
    draft: &AppointmentDraft,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE appointments SET
            patient_id = ?2, doctor_id = ?3, assigned_nurse_id = ?4, appointment_date = ?5,
            appointment_time = ?6, duration = ?7, appointment_type = ?8, status = ?9,
            reason = ?10, notes = ?11, updated_at = ?12
         WHERE id = ?1",
        params![
            id,
            draft.patient_id,
            draft.doctor_id,
            draft.assigned_nurse_id,
            draft.appointment_date.to_string(),
            fmt_time(&draft.appointment_time),
            draft.duration,
            draft.appointment_type.as_str(),
            draft.status.as_str(),
            draft.reason,
            draft.notes,
            fmt_datetime(&now),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Appointment", id));
    }
    Ok(())
}

pub fn set_appointment_status(
    conn: &Connection,
    id: i64,
    status: AppointmentStatus,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.as_str(), fmt_datetime(&now)],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Appointment", id));
    }
    Ok(())
}

pub fn delete_appointment(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("Appointment", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{delete_patient, delete_user};
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;
    use crate::test_support::{appointment_draft, date, fixed_now, seed_patient, seed_user, time};

    #[test]
    fn sequential_appointment_ids() {
        let conn = open_memory_database().unwrap();
        let doctor = seed_user(&conn, "house", Role::Doctor);
        let patient = seed_patient(&conn, "p@hms.test");
        for n in 1..=4u32 {
            let draft = appointment_draft(patient.id, Some(doctor), date(2025, 3, 11), time(8 + n, 0));
            let id = create_appointment(&conn, &draft, None, fixed_now()).unwrap();
            let view = get_appointment(&conn, id).unwrap().unwrap();
            assert_eq!(view.appointment.appointment_id, format!("APT-{n:06}"));
        }
    }

    #[test]
    fn duplicate_slot_is_rejected_by_store() {
        let conn = open_memory_database().unwrap();
        let house = seed_user(&conn, "house", Role::Doctor);
        let wilson = seed_user(&conn, "wilson", Role::Doctor);
        let patient = seed_patient(&conn, "p@hms.test");
        let day = date(2025, 3, 11);

        create_appointment(&conn, &appointment_draft(patient.id, Some(house), day, time(9, 0)), None, fixed_now()).unwrap();
        let err = create_appointment(&conn, &appointment_draft(patient.id, Some(house), day, time(9, 0)), None, fixed_now())
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));

        create_appointment(&conn, &appointment_draft(patient.id, Some(house), day, time(9, 30)), None, fixed_now()).unwrap();
        create_appointment(&conn, &appointment_draft(patient.id, Some(wilson), day, time(9, 0)), None, fixed_now()).unwrap();
    }

    #[test]
    fn update_into_taken_slot_is_rejected() {
        let conn = open_memory_database().unwrap();
        let doctor = seed_user(&conn, "house", Role::Doctor);
        let patient = seed_patient(&conn, "p@hms.test");
        let day = date(2025, 3, 11);
        create_appointment(&conn, &appointment_draft(patient.id, Some(doctor), day, time(9, 0)), None, fixed_now()).unwrap();
        let second = create_appointment(&conn, &appointment_draft(patient.id, Some(doctor), day, time(10, 0)), None, fixed_now()).unwrap();

        let clash = appointment_draft(patient.id, Some(doctor), day, time(9, 0));
        let err = update_appointment(&conn, second, &clash, fixed_now()).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn view_exposes_patient_and_doctor() {
        let conn = open_memory_database().unwrap();
        let doctor = seed_user(&conn, "house", Role::Doctor);
        let patient = seed_patient(&conn, "p@hms.test");
        let id = create_appointment(
            &conn,
            &appointment_draft(patient.id, Some(doctor), date(2025, 3, 11), time(9, 0)),
            Some(doctor),
            fixed_now(),
        )
        .unwrap();

        let view = get_appointment(&conn, id).unwrap().unwrap();
        assert_eq!(view.patient_name, "Jane Doe");
        assert_eq!(view.patient_phone, "5550100");
        assert_eq!(view.doctor_name.as_deref(), Some("house Test"));
        assert_eq!(view.appointment.created_by_id, Some(doctor));
        assert_eq!(view.appointment.appointment_time, time(9, 0));
    }

    #[test]
    fn list_filters_by_status_date_and_search() {
        let conn = open_memory_database().unwrap();
        let doctor = seed_user(&conn, "house", Role::Doctor);
        let patient = seed_patient(&conn, "p@hms.test");
        let today = fixed_now().date();
        let a = create_appointment(&conn, &appointment_draft(patient.id, Some(doctor), today, time(9, 0)), None, fixed_now()).unwrap();
        create_appointment(&conn, &appointment_draft(patient.id, Some(doctor), date(2025, 3, 12), time(9, 0)), None, fixed_now()).unwrap();
        set_appointment_status(&conn, a, AppointmentStatus::Cancelled, fixed_now()).unwrap();

        let pending = list_appointments(
            &conn,
            &AppointmentFilter {
                statuses: vec![AppointmentStatus::Scheduled, AppointmentStatus::Confirmed],
                date_from: Some(today),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].appointment.appointment_date, date(2025, 3, 12));

        let on_day = list_appointments(
            &conn,
            &AppointmentFilter {
                appointment_date: Some(today),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(on_day.len(), 1);

        let by_id = list_appointments(
            &conn,
            &AppointmentFilter {
                search: Some("APT-000002".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_id.len(), 1);

        let by_name = list_appointments(
            &conn,
            &AppointmentFilter {
                search: Some("jane".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_name.len(), 2);
    }

    #[test]
    fn doctor_deletion_keeps_appointment() {
        let conn = open_memory_database().unwrap();
        let doctor = seed_user(&conn, "house", Role::Doctor);
        let patient = seed_patient(&conn, "p@hms.test");
        let id = create_appointment(&conn, &appointment_draft(patient.id, Some(doctor), date(2025, 3, 11), time(9, 0)), None, fixed_now()).unwrap();

        delete_user(&conn, doctor).unwrap();
        let view = get_appointment(&conn, id).unwrap().unwrap();
        assert_eq!(view.appointment.doctor_id, None);
        assert_eq!(view.doctor_name, None);
    }

    #[test]
    fn patient_deletion_cascades() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn, "p@hms.test");
        let id = create_appointment(&conn, &appointment_draft(patient.id, None, date(2025, 3, 11), time(9, 0)), None, fixed_now()).unwrap();
        delete_patient(&conn, patient.id).unwrap();
        assert!(get_appointment(&conn, id).unwrap().is_none());
    }
}
