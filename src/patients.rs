//! Patient registry: registration, updates with nurse-assignment audit,
//! and the per-patient views (records, appointments, assignment history).

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;

use crate::authorization::{ensure_allowed, Action};
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    AppointmentFilter, AppointmentView, BloodGroup, Gender, MedicalRecordFilter,
    MedicalRecordView, Patient, PatientAssignmentLog, PatientDraft, PatientFilter, Role, User,
};
use crate::validation::{
    accept, blank_text, check_user_reference, choice, date, double_option, email, text, Form,
    WriteMode,
};

/// Writable patient fields as submitted. Read-only fields (`patient_id`,
/// `user`, timestamps, derived values) are ignored when present.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatientInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relation: Option<String>,
    pub allergies: Option<String>,
    pub chronic_conditions: Option<String>,
    pub current_medications: Option<String>,
    pub is_active: Option<bool>,
    #[serde(deserialize_with = "double_option")]
    pub assigned_nurse: Option<Option<i64>>,
}

/// Validate `input` merged onto the form's base, including the nurse
/// reference, and report every failing field at once.
pub(crate) fn validate_patient(
    conn: &Connection,
    input: PatientInput,
    mut form: Form<'_, PatientDraft>,
) -> ServiceResult<PatientDraft> {
    let first_name = form.required("first_name", input.first_name, text(100), |p| p.first_name.clone());
    let last_name = form.required("last_name", input.last_name, text(100), |p| p.last_name.clone());
    let date_of_birth = form.required("date_of_birth", input.date_of_birth, date, |p| p.date_of_birth);
    let gender = form.required("gender", input.gender, choice::<Gender>, |p| p.gender);
    let blood_group = form.required("blood_group", input.blood_group, choice::<BloodGroup>, |p| p.blood_group);
    let email = form.required("email", input.email, email, |p| p.email.clone());
    let phone = form.required("phone", input.phone, text(15), |p| p.phone.clone());
    let address = form.required("address", input.address, text(0), |p| p.address.clone());
    let city = form.required("city", input.city, text(100), |p| p.city.clone());
    let state = form.required("state", input.state, text(100), |p| p.state.clone());
    let zip_code = form.required("zip_code", input.zip_code, text(10), |p| p.zip_code.clone());
    let emergency_contact_name = form.required(
        "emergency_contact_name",
        input.emergency_contact_name,
        text(100),
        |p| p.emergency_contact_name.clone(),
    );
    let emergency_contact_phone = form.required(
        "emergency_contact_phone",
        input.emergency_contact_phone,
        text(15),
        |p| p.emergency_contact_phone.clone(),
    );
    let emergency_contact_relation = form.required(
        "emergency_contact_relation",
        input.emergency_contact_relation,
        text(50),
        |p| p.emergency_contact_relation.clone(),
    );
    let allergies = form.optional("allergies", input.allergies, blank_text(0), |p| p.allergies.clone(), String::new());
    let chronic_conditions = form.optional(
        "chronic_conditions",
        input.chronic_conditions,
        blank_text(0),
        |p| p.chronic_conditions.clone(),
        String::new(),
    );
    let current_medications = form.optional(
        "current_medications",
        input.current_medications,
        blank_text(0),
        |p| p.current_medications.clone(),
        String::new(),
    );
    let is_active = form.optional("is_active", input.is_active, accept, |p| p.is_active, true);
    let assigned_nurse_id =
        form.optional("assigned_nurse", input.assigned_nurse, accept, |p| p.assigned_nurse_id, None);

    if let Some(nurse) = assigned_nurse_id {
        check_user_reference(conn, form.errors_mut(), "assigned_nurse", nurse, Role::Nurse)?;
    }

    let draft = form.finish(move || {
        Some(PatientDraft {
            first_name: first_name?,
            last_name: last_name?,
            date_of_birth: date_of_birth?,
            gender: gender?,
            blood_group: blood_group?,
            email: email?,
            phone: phone?,
            address: address?,
            city: city?,
            state: state?,
            zip_code: zip_code?,
            emergency_contact_name: emergency_contact_name?,
            emergency_contact_phone: emergency_contact_phone?,
            emergency_contact_relation: emergency_contact_relation?,
            allergies: allergies?,
            chronic_conditions: chronic_conditions?,
            current_medications: current_medications?,
            is_active: is_active?,
            assigned_nurse_id: assigned_nurse_id?,
        })
    })?;
    Ok(draft)
}

/// Register a patient. A nurse set at creation is logged as the first
/// assignment.
pub fn create_patient(
    conn: &mut Connection,
    actor: &User,
    input: PatientInput,
    now: NaiveDateTime,
) -> ServiceResult<Patient> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let draft = validate_patient(&tx, input, Form::create())?;
    let patient = repository::create_patient(&tx, None, &draft, now)?;
    if patient.assigned_nurse_id.is_some() {
        repository::append_assignment_log(&tx, patient.id, patient.assigned_nurse_id, Some(actor.id), now)?;
    }
    tx.commit()?;

    tracing::info!(patient_id = %patient.patient_id, actor = actor.id, "patient registered");
    Ok(patient)
}

/// PUT or PATCH a patient. A changed `assigned_nurse` appends exactly one
/// assignment log row in the same transaction.
pub fn update_patient(
    conn: &mut Connection,
    actor: &User,
    id: i64,
    input: PatientInput,
    mode: WriteMode,
    now: NaiveDateTime,
) -> ServiceResult<Patient> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existing = require_patient(&tx, id)?;
    let base = existing.draft();
    let draft = validate_patient(&tx, input, Form::update(mode, &base))?;

    repository::update_patient(&tx, id, &draft, now)?;
    if draft.assigned_nurse_id != existing.assigned_nurse_id {
        repository::append_assignment_log(&tx, id, draft.assigned_nurse_id, Some(actor.id), now)?;
        tracing::info!(
            patient_id = %existing.patient_id,
            nurse = ?draft.assigned_nurse_id,
            actor = actor.id,
            "nurse assignment changed"
        );
    }
    let updated = require_patient(&tx, id)?;
    tx.commit()?;
    Ok(updated)
}

pub fn get_patient(conn: &Connection, id: i64) -> ServiceResult<Patient> {
    require_patient(conn, id)
}

fn require_patient(conn: &Connection, id: i64) -> ServiceResult<Patient> {
    repository::get_patient(conn, id)?.ok_or_else(|| ServiceError::NotFound(format!("Patient {id}")))
}

pub fn list_patients(conn: &Connection, filter: &PatientFilter) -> ServiceResult<Vec<Patient>> {
    Ok(repository::list_patients(conn, filter)?)
}

/// Deletes the patient together with its records, appointments, tasks and
/// assignment history.
pub fn delete_patient(conn: &Connection, actor: &User, id: i64) -> ServiceResult<()> {
    let patient = require_patient(conn, id)?;
    repository::delete_patient(conn, id)?;
    tracing::info!(patient_id = %patient.patient_id, actor = actor.id, "patient deleted");
    Ok(())
}

pub fn patient_medical_records(conn: &Connection, id: i64) -> ServiceResult<Vec<MedicalRecordView>> {
    require_patient(conn, id)?;
    let filter = MedicalRecordFilter {
        patient_id: Some(id),
        ..Default::default()
    };
    Ok(repository::list_medical_records(conn, &filter)?)
}

pub fn patient_appointments(conn: &Connection, id: i64) -> ServiceResult<Vec<AppointmentView>> {
    require_patient(conn, id)?;
    let filter = AppointmentFilter {
        patient_id: Some(id),
        ..Default::default()
    };
    Ok(repository::list_appointments(conn, &filter)?)
}

pub fn assignment_history(conn: &Connection, id: i64) -> ServiceResult<Vec<PatientAssignmentLog>> {
    require_patient(conn, id)?;
    Ok(repository::list_assignment_logs(conn, id)?)
}

/// Patients whose assigned nurse is the caller. Nurses only.
pub fn assigned_to_me(conn: &Connection, actor: &User) -> ServiceResult<Vec<Patient>> {
    ensure_allowed(actor.role, Action::ViewAssignedPatients)?;
    let filter = PatientFilter {
        assigned_nurse_id: Some(actor.id),
        ..Default::default()
    };
    Ok(repository::list_patients(conn, &filter)?)
}
