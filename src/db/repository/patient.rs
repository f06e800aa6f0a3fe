use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::query::{fmt_datetime, order_by, parse_col, SqlFilter};
use super::sequence::next_public_id;
use crate::db::DatabaseError;
use crate::models::{IdKind, Patient, PatientDraft, PatientFilter};

const PATIENT_COLUMNS: &str = "p.id, p.patient_id, p.user_id, p.first_name, p.last_name, \
     p.date_of_birth, p.gender, p.blood_group, p.email, p.phone, p.address, p.city, p.state, \
     p.zip_code, p.emergency_contact_name, p.emergency_contact_phone, \
     p.emergency_contact_relation, p.allergies, p.chronic_conditions, p.current_medications, \
     p.is_active, p.assigned_nurse_id, p.registered_date, p.updated_at";

const PATIENT_ORDERING: &[(&str, &str)] = &[
    ("registered_date", "p.registered_date"),
    ("first_name", "p.first_name"),
    ("last_name", "p.last_name"),
];

const PATIENT_SEARCH: &[&str] = &[
    "p.first_name",
    "p.last_name",
    "p.patient_id",
    "p.email",
    "p.phone",
];

fn map_patient(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        user_id: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        date_of_birth: parse_col(row, 5)?,
        gender: parse_col(row, 6)?,
        blood_group: parse_col(row, 7)?,
        email: row.get(8)?,
        phone: row.get(9)?,
        address: row.get(10)?,
        city: row.get(11)?,
        state: row.get(12)?,
        zip_code: row.get(13)?,
        emergency_contact_name: row.get(14)?,
        emergency_contact_phone: row.get(15)?,
        emergency_contact_relation: row.get(16)?,
        allergies: row.get(17)?,
        chronic_conditions: row.get(18)?,
        current_medications: row.get(19)?,
        is_active: row.get(20)?,
        assigned_nurse_id: row.get(21)?,
        registered_date: parse_col(row, 22)?,
        updated_at: parse_col(row, 23)?,
    })
}

/// Allocate the next `PAT-` identifier and insert the patient.
///
/// Callers run this inside an immediate transaction.
pub fn create_patient(
    conn: &Connection,
    user_id: Option<i64>,
    draft: &PatientDraft,
    now: NaiveDateTime,
) -> Result<Patient, DatabaseError> {
    let patient_id = next_public_id(conn, IdKind::Patient)?;
    let stamp = fmt_datetime(&now);
    conn.execute(
        "INSERT INTO patients (
            patient_id, user_id, first_name, last_name, date_of_birth, gender, blood_group,
            email, phone, address, city, state, zip_code,
            emergency_contact_name, emergency_contact_phone, emergency_contact_relation,
            allergies, chronic_conditions, current_medications,
            is_active, assigned_nurse_id, registered_date, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                   ?17, ?18, ?19, ?20, ?21, ?22, ?22)",
        params![
            patient_id,
            user_id,
            draft.first_name,
            draft.last_name,
            draft.date_of_birth.to_string(),
            draft.gender.as_str(),
            draft.blood_group.as_str(),
            draft.email,
            draft.phone,
            draft.address,
            draft.city,
            draft.state,
            draft.zip_code,
            draft.emergency_contact_name,
            draft.emergency_contact_phone,
            draft.emergency_contact_relation,
            draft.allergies,
            draft.chronic_conditions,
            draft.current_medications,
            draft.is_active,
            draft.assigned_nurse_id,
            stamp,
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(patient_id = %patient_id, id, "patient inserted");
    get_patient(conn, id)?.ok_or_else(|| DatabaseError::not_found("Patient", id))
}

pub fn get_patient(conn: &Connection, id: i64) -> Result<Option<Patient>, DatabaseError> {
    let patient = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients p WHERE p.id = ?1"),
            params![id],
            map_patient,
        )
        .optional()?;
    Ok(patient)
}

pub fn get_patient_by_user(conn: &Connection, user_id: i64) -> Result<Option<Patient>, DatabaseError> {
    let patient = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients p WHERE p.user_id = ?1"),
            params![user_id],
            map_patient,
        )
        .optional()?;
    Ok(patient)
}

pub fn list_patients(conn: &Connection, filter: &PatientFilter) -> Result<Vec<Patient>, DatabaseError> {
    let mut sql = SqlFilter::new();
    sql.eq_opt("p.blood_group", filter.blood_group.map(|b| b.as_str()));
    sql.eq_opt("p.gender", filter.gender.map(|g| g.as_str()));
    sql.eq_opt("p.is_active", filter.is_active);
    sql.eq_opt("p.user_id", filter.user_id);
    sql.eq_opt("p.assigned_nurse_id", filter.assigned_nurse_id);
    sql.search(PATIENT_SEARCH, filter.search.as_deref());

    let query = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients p{}{}",
        sql.where_sql(),
        order_by(
            filter.ordering.as_deref(),
            PATIENT_ORDERING,
            "p.registered_date DESC, p.id DESC",
        ),
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(sql.params().as_slice(), map_patient)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Overwrite every writable column. `patient_id`, `user_id` and
/// `registered_date` are left alone.
pub fn update_patient(
    conn: &Connection,
    id: i64,
    draft: &PatientDraft,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE patients SET
            first_name = ?2, last_name = ?3, date_of_birth = ?4, gender = ?5, blood_group = ?6,
            email = ?7, phone = ?8, address = ?9, city = ?10, state = ?11, zip_code = ?12,
            emergency_contact_name = ?13, emergency_contact_phone = ?14,
            emergency_contact_relation = ?15, allergies = ?16, chronic_conditions = ?17,
            current_medications = ?18, is_active = ?19, assigned_nurse_id = ?20, updated_at = ?21
         WHERE id = ?1",
        params![
            id,
            draft.first_name,
            draft.last_name,
            draft.date_of_birth.to_string(),
            draft.gender.as_str(),
            draft.blood_group.as_str(),
            draft.email,
            draft.phone,
            draft.address,
            draft.city,
            draft.state,
            draft.zip_code,
            draft.emergency_contact_name,
            draft.emergency_contact_phone,
            draft.emergency_contact_relation,
            draft.allergies,
            draft.chronic_conditions,
            draft.current_medications,
            draft.is_active,
            draft.assigned_nurse_id,
            fmt_datetime(&now),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Patient", id));
    }
    Ok(())
}

/// Records, appointments, tasks and assignment logs go with the patient.
pub fn delete_patient(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM patients WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("Patient", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{BloodGroup, Gender, Role};
    use crate::test_support::{fixed_now, patient_draft, seed_user};
    use chrono::Duration;

    #[test]
    fn sequential_patient_ids() {
        let conn = open_memory_database().unwrap();
        for n in 1..=5 {
            let draft = patient_draft(&format!("p{n}@hms.test"));
            let patient = create_patient(&conn, None, &draft, fixed_now()).unwrap();
            assert_eq!(patient.patient_id, format!("PAT-{n:06}"));
        }
    }

    #[test]
    fn created_patient_round_trips() {
        let conn = open_memory_database().unwrap();
        let mut draft = patient_draft("ada@hms.test");
        draft.blood_group = BloodGroup::AbNegative;
        let created = create_patient(&conn, None, &draft, fixed_now()).unwrap();

        assert_eq!(created.draft(), draft);
        assert_eq!(created.registered_date, fixed_now());
        assert_eq!(created.updated_at, fixed_now());
        assert!(created.is_active);
    }

    #[test]
    fn duplicate_email_is_constraint_violation() {
        let conn = open_memory_database().unwrap();
        create_patient(&conn, None, &patient_draft("same@hms.test"), fixed_now()).unwrap();
        let err = create_patient(&conn, None, &patient_draft("same@hms.test"), fixed_now()).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn update_keeps_identifier_and_registration() {
        let conn = open_memory_database().unwrap();
        let p = create_patient(&conn, None, &patient_draft("u@hms.test"), fixed_now()).unwrap();
        let mut draft = p.draft();
        draft.city = "Lyon".into();
        let later = fixed_now() + Duration::hours(2);
        update_patient(&conn, p.id, &draft, later).unwrap();

        let updated = get_patient(&conn, p.id).unwrap().unwrap();
        assert_eq!(updated.city, "Lyon");
        assert_eq!(updated.patient_id, p.patient_id);
        assert_eq!(updated.registered_date, fixed_now());
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn list_filters_searches_and_orders() {
        let conn = open_memory_database().unwrap();
        let mut a = patient_draft("ada@hms.test");
        a.first_name = "Ada".into();
        a.last_name = "Lovelace".into();
        let mut b = patient_draft("grace@hms.test");
        b.first_name = "Grace".into();
        b.last_name = "Hopper".into();
        b.gender = Gender::Other;
        b.is_active = false;
        create_patient(&conn, None, &a, fixed_now()).unwrap();
        create_patient(&conn, None, &b, fixed_now() + Duration::minutes(1)).unwrap();

        let newest_first = list_patients(&conn, &PatientFilter::default()).unwrap();
        assert_eq!(newest_first[0].first_name, "Grace");

        let by_name = list_patients(
            &conn,
            &PatientFilter {
                ordering: Some("first_name".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_name[0].first_name, "Ada");

        let search = list_patients(
            &conn,
            &PatientFilter {
                search: Some("grace hop".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(search.len(), 1);

        let inactive = list_patients(
            &conn,
            &PatientFilter {
                is_active: Some(false),
                gender: Some(Gender::Other),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].email, "grace@hms.test");
    }

    #[test]
    fn deleting_linked_user_removes_patient() {
        let conn = open_memory_database().unwrap();
        let user_id = seed_user(&conn, "selfserve", Role::Patient);
        let p = create_patient(&conn, Some(user_id), &patient_draft("s@hms.test"), fixed_now()).unwrap();
        assert_eq!(get_patient_by_user(&conn, user_id).unwrap().unwrap().id, p.id);

        crate::db::repository::delete_user(&conn, user_id).unwrap();
        assert!(get_patient(&conn, p.id).unwrap().is_none());
    }

    #[test]
    fn deleting_nurse_clears_assignment() {
        let conn = open_memory_database().unwrap();
        let nurse = seed_user(&conn, "nurse", Role::Nurse);
        let mut draft = patient_draft("n@hms.test");
        draft.assigned_nurse_id = Some(nurse);
        let p = create_patient(&conn, None, &draft, fixed_now()).unwrap();

        crate::db::repository::delete_user(&conn, nurse).unwrap();
        let after = get_patient(&conn, p.id).unwrap().unwrap();
        assert_eq!(after.assigned_nurse_id, None);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            delete_patient(&conn, 7).unwrap_err(),
            DatabaseError::NotFound { .. }
        ));
    }
}
