//! Medical record log: visit notes and vitals per patient.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;

use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{MedicalRecordDraft, MedicalRecordFilter, MedicalRecordView, Role, User};
use crate::validation::{
    accept, blank_text, check_patient_reference, check_user_reference, datetime, decimal,
    double_option, int_range, text, Form, WriteMode,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MedicalRecordInput {
    pub patient: Option<i64>,
    #[serde(deserialize_with = "double_option")]
    pub doctor: Option<Option<i64>>,
    pub visit_date: Option<String>,
    pub diagnosis: Option<String>,
    pub symptoms: Option<String>,
    pub prescription: Option<String>,
    pub lab_results: Option<String>,
    pub notes: Option<String>,
    pub blood_pressure: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub temperature: Option<Option<f64>>,
    #[serde(deserialize_with = "double_option")]
    pub heart_rate: Option<Option<i64>>,
    #[serde(deserialize_with = "double_option")]
    pub respiratory_rate: Option<Option<i64>>,
    #[serde(deserialize_with = "double_option")]
    pub oxygen_saturation: Option<Option<i64>>,
}

fn validate_record(
    conn: &Connection,
    input: MedicalRecordInput,
    mut form: Form<'_, MedicalRecordDraft>,
    default_doctor: Option<i64>,
) -> ServiceResult<MedicalRecordDraft> {
    let patient_id = form.required("patient", input.patient, accept, |r| r.patient_id);
    let doctor_id = form.optional("doctor", input.doctor, accept, |r| r.doctor_id, default_doctor);
    let visit_date = form.required("visit_date", input.visit_date, datetime, |r| r.visit_date);
    let diagnosis = form.required("diagnosis", input.diagnosis, text(0), |r| r.diagnosis.clone());
    let symptoms = form.required("symptoms", input.symptoms, text(0), |r| r.symptoms.clone());
    let prescription =
        form.optional("prescription", input.prescription, blank_text(0), |r| r.prescription.clone(), String::new());
    let lab_results =
        form.optional("lab_results", input.lab_results, blank_text(0), |r| r.lab_results.clone(), String::new());
    let notes = form.optional("notes", input.notes, blank_text(0), |r| r.notes.clone(), String::new());
    let blood_pressure = form.optional(
        "blood_pressure",
        input.blood_pressure,
        blank_text(20),
        |r| r.blood_pressure.clone(),
        String::new(),
    );
    let temperature = form.optional("temperature", input.temperature, decimal(4, 1), |r| r.temperature, None);
    let heart_rate =
        form.optional("heart_rate", input.heart_rate, int_range(0, i64::from(i32::MAX)), |r| r.heart_rate, None);
    let respiratory_rate = form.optional(
        "respiratory_rate",
        input.respiratory_rate,
        int_range(0, i64::from(i32::MAX)),
        |r| r.respiratory_rate,
        None,
    );
    let oxygen_saturation = form.optional(
        "oxygen_saturation",
        input.oxygen_saturation,
        int_range(0, 100),
        |r| r.oxygen_saturation,
        None,
    );

    if let Some(patient) = patient_id {
        check_patient_reference(conn, form.errors_mut(), "patient", patient)?;
    }
    if let Some(doctor) = doctor_id {
        check_user_reference(conn, form.errors_mut(), "doctor", doctor, Role::Doctor)?;
    }

    let draft = form.finish(move || {
        Some(MedicalRecordDraft {
            patient_id: patient_id?,
            doctor_id: doctor_id?,
            visit_date: visit_date?,
            diagnosis: diagnosis?,
            symptoms: symptoms?,
            prescription: prescription?,
            lab_results: lab_results?,
            notes: notes?,
            blood_pressure: blood_pressure?,
            temperature: temperature?,
            heart_rate: heart_rate?,
            respiratory_rate: respiratory_rate?,
            oxygen_saturation: oxygen_saturation?,
        })
    })?;
    Ok(draft)
}

/// Record a visit. When the payload names no doctor and the caller is a
/// doctor, the caller is recorded as the treating doctor.
pub fn create_record(
    conn: &mut Connection,
    actor: &User,
    input: MedicalRecordInput,
    now: NaiveDateTime,
) -> ServiceResult<MedicalRecordView> {
    let default_doctor = (actor.role == Role::Doctor).then_some(actor.id);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let draft = validate_record(&tx, input, Form::create(), default_doctor)?;
    let id = repository::insert_medical_record(&tx, &draft, now)?;
    let view = require_record(&tx, id)?;
    tx.commit()?;

    tracing::info!(record = id, patient = draft.patient_id, actor = actor.id, "medical record created");
    Ok(view)
}

pub fn update_record(
    conn: &mut Connection,
    id: i64,
    input: MedicalRecordInput,
    mode: WriteMode,
    now: NaiveDateTime,
) -> ServiceResult<MedicalRecordView> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let base = require_record(&tx, id)?.record.draft();
    let draft = validate_record(&tx, input, Form::update(mode, &base), None)?;
    repository::update_medical_record(&tx, id, &draft, now)?;
    let view = require_record(&tx, id)?;
    tx.commit()?;
    Ok(view)
}

pub fn get_record(conn: &Connection, id: i64) -> ServiceResult<MedicalRecordView> {
    require_record(conn, id)
}

fn require_record(conn: &Connection, id: i64) -> ServiceResult<MedicalRecordView> {
    repository::get_medical_record(conn, id)?
        .ok_or_else(|| ServiceError::NotFound(format!("MedicalRecord {id}")))
}

pub fn list_records(conn: &Connection, filter: &MedicalRecordFilter) -> ServiceResult<Vec<MedicalRecordView>> {
    Ok(repository::list_medical_records(conn, filter)?)
}

pub fn delete_record(conn: &Connection, id: i64) -> ServiceResult<()> {
    repository::delete_medical_record(conn, id)?;
    tracing::info!(record = id, "medical record deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::test_support::{fixed_now, seed_patient, seed_user};

    fn user(conn: &Connection, username: &str, role: Role) -> User {
        let id = seed_user(conn, username, role);
        repository::get_user(conn, id).unwrap().unwrap()
    }

    fn input(value: serde_json::Value) -> MedicalRecordInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn doctor_defaults_to_calling_doctor() {
        let mut conn = open_memory_database().unwrap();
        let house = user(&conn, "house", Role::Doctor);
        let patient = seed_patient(&conn, "p@hms.test");

        let view = create_record(
            &mut conn,
            &house,
            input(serde_json::json!({
                "patient": patient.id,
                "visit_date": "2025-03-10T09:15:00",
                "diagnosis": "Seasonal flu",
                "symptoms": "Fever",
                "temperature": 38.4,
                "oxygen_saturation": 97,
            })),
            fixed_now(),
        )
        .unwrap();

        assert_eq!(view.record.doctor_id, Some(house.id));
        assert_eq!(view.doctor_name.as_deref(), Some("house Test"));
        assert_eq!(view.patient_name, "Jane Doe");
        assert_eq!(view.record.temperature, Some(38.4));
        assert_eq!(view.record.prescription, "");
    }

    #[test]
    fn nurse_created_record_has_no_doctor_unless_named() {
        let mut conn = open_memory_database().unwrap();
        let nina = user(&conn, "nina", Role::Nurse);
        let patient = seed_patient(&conn, "p@hms.test");
        let view = create_record(
            &mut conn,
            &nina,
            input(serde_json::json!({
                "patient": patient.id,
                "visit_date": "2025-03-10T09:15:00",
                "diagnosis": "Sprain",
                "symptoms": "Swelling",
            })),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(view.record.doctor_id, None);
    }

    #[test]
    fn vitals_are_range_checked() {
        let mut conn = open_memory_database().unwrap();
        let house = user(&conn, "house", Role::Doctor);
        let patient = seed_patient(&conn, "p@hms.test");
        let err = create_record(
            &mut conn,
            &house,
            input(serde_json::json!({
                "patient": patient.id,
                "visit_date": "2025-03-10T09:15:00",
                "diagnosis": "x",
                "symptoms": "y",
                "temperature": 37.25,
                "oxygen_saturation": 101,
                "blood_pressure": "120/80 mmHg sitting, left arm",
            })),
            fixed_now(),
        )
        .unwrap_err();
        let ServiceError::Validation(errors) = err else { panic!("expected validation failure") };
        assert!(errors.contains("temperature"));
        assert!(errors.contains("oxygen_saturation"));
        assert!(errors.contains("blood_pressure"));
    }

    #[test]
    fn references_are_checked() {
        let mut conn = open_memory_database().unwrap();
        let nina = user(&conn, "nina", Role::Nurse);
        let err = create_record(
            &mut conn,
            &nina,
            input(serde_json::json!({
                "patient": 99,
                "doctor": nina.id,
                "visit_date": "2025-03-10T09:15:00",
                "diagnosis": "x",
                "symptoms": "y",
            })),
            fixed_now(),
        )
        .unwrap_err();
        let ServiceError::Validation(errors) = err else { panic!("expected validation failure") };
        assert!(errors.contains("patient"));
        assert!(errors.contains("doctor"));
    }

    #[test]
    fn patch_clears_vitals_with_null() {
        let mut conn = open_memory_database().unwrap();
        let house = user(&conn, "house", Role::Doctor);
        let patient = seed_patient(&conn, "p@hms.test");
        let created = create_record(
            &mut conn,
            &house,
            input(serde_json::json!({
                "patient": patient.id,
                "visit_date": "2025-03-10T09:15:00",
                "diagnosis": "x",
                "symptoms": "y",
                "heart_rate": 72,
            })),
            fixed_now(),
        )
        .unwrap();

        let updated = update_record(
            &mut conn,
            created.record.id,
            input(serde_json::json!({"heart_rate": null, "notes": "follow up in a week"})),
            WriteMode::Partial,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(updated.record.heart_rate, None);
        assert_eq!(updated.record.notes, "follow up in a week");
        assert_eq!(updated.record.doctor_id, Some(house.id));
        assert_eq!(updated.record.created_at, created.record.created_at);
    }

    #[test]
    fn missing_record_is_not_found() {
        let mut conn = open_memory_database().unwrap();
        assert!(matches!(get_record(&conn, 5), Err(ServiceError::NotFound(_))));
        assert!(matches!(delete_record(&conn, 5), Err(ServiceError::NotFound(_))));
        let err = update_record(&mut conn, 5, MedicalRecordInput::default(), WriteMode::Partial, fixed_now());
        assert!(matches!(err, Err(ServiceError::NotFound(_))));
    }
}
