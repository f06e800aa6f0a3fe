//! Appointment scheduling.
//!
//! Status lifecycle:
//! ```text
//! scheduled → confirmed → in_progress → completed
//!     └──────────┴────────────┴──→ cancelled | no_show
//! ```
//! `confirm` and `cancel` are the guarded transitions. Other status changes
//! go through a plain update. The (doctor, date, time) slot is unique and
//! enforced by the store, so a double booking surfaces as a conflict.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;

use crate::authorization::{ensure_allowed, Action};
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    AppointmentDraft, AppointmentFilter, AppointmentStatus, AppointmentType, AppointmentView,
    Role, User,
};
use crate::validation::{
    accept, blank_text, check_patient_reference, check_user_reference, choice, date,
    double_option, int_range, not_null, text, time, Form, WriteMode,
};

pub const DEFAULT_DURATION_MINUTES: i32 = 30;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppointmentInput {
    pub patient: Option<i64>,
    #[serde(deserialize_with = "double_option")]
    pub doctor: Option<Option<i64>>,
    #[serde(deserialize_with = "double_option")]
    pub assigned_nurse: Option<Option<i64>>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub duration: Option<i64>,
    pub appointment_type: Option<String>,
    pub status: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

fn validate_appointment(
    conn: &Connection,
    mut input: AppointmentInput,
    mut form: Form<'_, AppointmentDraft>,
) -> ServiceResult<AppointmentDraft> {
    // New appointments always start out scheduled.
    if form.mode() == WriteMode::Create {
        input.status = None;
    }

    let patient_id = form.required("patient", input.patient, accept, |a| a.patient_id);
    let doctor_id = form.required("doctor", input.doctor, not_null, |a| a.doctor_id);
    let assigned_nurse_id =
        form.optional("assigned_nurse", input.assigned_nurse, accept, |a| a.assigned_nurse_id, None);
    let appointment_date =
        form.required("appointment_date", input.appointment_date, date, |a| a.appointment_date);
    let appointment_time =
        form.required("appointment_time", input.appointment_time, time, |a| a.appointment_time);
    let duration = form.optional(
        "duration",
        input.duration.map(Some),
        int_range(1, i64::from(i32::MAX)),
        |a| Some(a.duration),
        Some(DEFAULT_DURATION_MINUTES),
    );
    let appointment_type = form.optional(
        "appointment_type",
        input.appointment_type,
        choice::<AppointmentType>,
        |a| a.appointment_type,
        AppointmentType::default(),
    );
    let status = form.optional(
        "status",
        input.status,
        choice::<AppointmentStatus>,
        |a| a.status,
        AppointmentStatus::default(),
    );
    let reason = form.required("reason", input.reason, text(0), |a| a.reason.clone());
    let notes = form.optional("notes", input.notes, blank_text(0), |a| a.notes.clone(), String::new());

    if let Some(patient) = patient_id {
        check_patient_reference(conn, form.errors_mut(), "patient", patient)?;
    }
    if let Some(doctor) = doctor_id {
        check_user_reference(conn, form.errors_mut(), "doctor", doctor, Role::Doctor)?;
    }
    if let Some(nurse) = assigned_nurse_id {
        check_user_reference(conn, form.errors_mut(), "assigned_nurse", nurse, Role::Nurse)?;
    }

    let draft = form.finish(move || {
        Some(AppointmentDraft {
            patient_id: patient_id?,
            doctor_id: doctor_id?,
            assigned_nurse_id: assigned_nurse_id?,
            appointment_date: appointment_date?,
            appointment_time: appointment_time?,
            duration: duration??,
            appointment_type: appointment_type?,
            status: status?,
            reason: reason?,
            notes: notes?,
        })
    })?;
    Ok(draft)
}

/// Book an appointment. The caller is recorded as its creator.
pub fn create_appointment(
    conn: &mut Connection,
    actor: &User,
    input: AppointmentInput,
    now: NaiveDateTime,
) -> ServiceResult<AppointmentView> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let draft = validate_appointment(&tx, input, Form::create())?;
    let id = repository::create_appointment(&tx, &draft, Some(actor.id), now)?;
    let view = require_appointment(&tx, id)?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %view.appointment.appointment_id,
        doctor = ?draft.doctor_id,
        actor = actor.id,
        "appointment booked"
    );
    Ok(view)
}

pub fn update_appointment(
    conn: &mut Connection,
    id: i64,
    input: AppointmentInput,
    mode: WriteMode,
    now: NaiveDateTime,
) -> ServiceResult<AppointmentView> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let base = require_appointment(&tx, id)?.appointment.draft();
    let draft = validate_appointment(&tx, input, Form::update(mode, &base))?;
    repository::update_appointment(&tx, id, &draft, now)?;
    let view = require_appointment(&tx, id)?;
    tx.commit()?;
    Ok(view)
}

/// Move to `confirmed`. Allowed from `scheduled`, and idempotent once confirmed.
pub fn confirm_appointment(conn: &mut Connection, id: i64, now: NaiveDateTime) -> ServiceResult<()> {
    transition(conn, id, AppointmentStatus::Confirmed, now)
}

/// Move to `cancelled` from any status that has not yet ended.
pub fn cancel_appointment(conn: &mut Connection, id: i64, now: NaiveDateTime) -> ServiceResult<()> {
    transition(conn, id, AppointmentStatus::Cancelled, now)
}

fn transition(
    conn: &mut Connection,
    id: i64,
    target: AppointmentStatus,
    now: NaiveDateTime,
) -> ServiceResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = require_appointment(&tx, id)?.appointment;
    let permitted = match target {
        AppointmentStatus::Confirmed => current.status.can_confirm(),
        AppointmentStatus::Cancelled => current.status.can_cancel(),
        _ => false,
    };
    if !permitted {
        return Err(ServiceError::field(
            "status",
            format!(
                "Cannot change status from \"{}\" to \"{}\".",
                current.status, target
            ),
        ));
    }
    repository::set_appointment_status(&tx, id, target, now)?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %current.appointment_id,
        from = %current.status,
        to = %target,
        "appointment status changed"
    );
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: i64) -> ServiceResult<AppointmentView> {
    require_appointment(conn, id)
}

fn require_appointment(conn: &Connection, id: i64) -> ServiceResult<AppointmentView> {
    repository::get_appointment(conn, id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Appointment {id}")))
}

pub fn list_appointments(conn: &Connection, filter: &AppointmentFilter) -> ServiceResult<Vec<AppointmentView>> {
    Ok(repository::list_appointments(conn, filter)?)
}

pub fn delete_appointment(conn: &Connection, id: i64) -> ServiceResult<()> {
    repository::delete_appointment(conn, id)?;
    tracing::info!(appointment = id, "appointment deleted");
    Ok(())
}

/// Every appointment dated today, whatever its status.
pub fn todays_appointments(conn: &Connection, now: NaiveDateTime) -> ServiceResult<Vec<AppointmentView>> {
    let filter = AppointmentFilter {
        appointment_date: Some(now.date()),
        ..Default::default()
    };
    list_appointments(conn, &filter)
}

/// Scheduled or confirmed appointments dated today or later.
pub fn upcoming_appointments(conn: &Connection, now: NaiveDateTime) -> ServiceResult<Vec<AppointmentView>> {
    let filter = AppointmentFilter {
        date_from: Some(now.date()),
        statuses: vec![AppointmentStatus::Scheduled, AppointmentStatus::Confirmed],
        ..Default::default()
    };
    list_appointments(conn, &filter)
}

/// Today's appointments that the calling nurse is assigned to.
pub fn nurse_agenda(conn: &Connection, actor: &User, now: NaiveDateTime) -> ServiceResult<Vec<AppointmentView>> {
    ensure_allowed(actor.role, Action::ViewNurseAgenda)?;
    let filter = AppointmentFilter {
        appointment_date: Some(now.date()),
        assigned_nurse_id: Some(actor.id),
        ..Default::default()
    };
    list_appointments(conn, &filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::test_support::{fixed_now, seed_patient, seed_user};

    struct Clinic {
        conn: Connection,
        admin: User,
        house: User,
        wilson: User,
        nina: User,
        patient: i64,
    }

    fn clinic() -> Clinic {
        let conn = open_memory_database().unwrap();
        let load = |id| repository::get_user(&conn, id).unwrap().unwrap();
        let admin = load(seed_user(&conn, "admin", Role::Admin));
        let house = load(seed_user(&conn, "house", Role::Doctor));
        let wilson = load(seed_user(&conn, "wilson", Role::Doctor));
        let nina = load(seed_user(&conn, "nina", Role::Nurse));
        let patient = seed_patient(&conn, "p@hms.test").id;
        Clinic { conn, admin, house, wilson, nina, patient }
    }

    fn booking(patient: i64, doctor: i64, day: &str, at: &str) -> AppointmentInput {
        serde_json::from_value(serde_json::json!({
            "patient": patient,
            "doctor": doctor,
            "appointment_date": day,
            "appointment_time": at,
            "reason": "Checkup",
        }))
        .unwrap()
    }

    #[test]
    fn create_applies_defaults_and_ignores_status() {
        let mut c = clinic();
        let mut input = booking(c.patient, c.house.id, "2025-03-11", "09:00");
        input.status = Some("completed".into());
        let view = create_appointment(&mut c.conn, &c.admin, input, fixed_now()).unwrap();

        let appt = &view.appointment;
        assert_eq!(appt.appointment_id, "APT-000001");
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.duration, DEFAULT_DURATION_MINUTES);
        assert_eq!(appt.appointment_type, AppointmentType::Consultation);
        assert_eq!(appt.created_by_id, Some(c.admin.id));
        assert!(view.clone().detail(fixed_now()).is_upcoming);
    }

    #[test]
    fn double_booking_a_doctor_slot_conflicts() {
        let mut c = clinic();
        create_appointment(&mut c.conn, &c.admin, booking(c.patient, c.house.id, "2025-03-11", "09:00"), fixed_now())
            .unwrap();

        let clash = create_appointment(
            &mut c.conn,
            &c.admin,
            booking(c.patient, c.house.id, "2025-03-11", "09:00:00"),
            fixed_now(),
        );
        assert!(matches!(clash, Err(ServiceError::Conflict(_))));

        create_appointment(&mut c.conn, &c.admin, booking(c.patient, c.house.id, "2025-03-11", "09:30"), fixed_now())
            .unwrap();
        let other = create_appointment(
            &mut c.conn,
            &c.admin,
            booking(c.patient, c.wilson.id, "2025-03-11", "09:00"),
            fixed_now(),
        )
        .unwrap();
        // The failed insert consumed no identifier.
        assert_eq!(other.appointment.appointment_id, "APT-000003");
    }

    #[test]
    fn doctor_must_have_doctor_role() {
        let mut c = clinic();
        let err = create_appointment(
            &mut c.conn,
            &c.admin,
            booking(c.patient, c.nina.id, "2025-03-11", "09:00"),
            fixed_now(),
        )
        .unwrap_err();
        let ServiceError::Validation(errors) = err else { panic!("expected validation failure") };
        assert!(errors.contains("doctor"));
    }

    #[test]
    fn doctor_cannot_be_null() {
        let mut c = clinic();
        let unassigned: AppointmentInput = serde_json::from_value(serde_json::json!({
            "patient": c.patient,
            "doctor": null,
            "appointment_date": "2025-03-11",
            "appointment_time": "09:00",
            "reason": "x",
        }))
        .unwrap();
        let err = create_appointment(&mut c.conn, &c.admin, unassigned, fixed_now()).unwrap_err();
        let ServiceError::Validation(errors) = err else { panic!("expected validation failure") };
        assert_eq!(errors.messages("doctor"), [crate::validation::NULL]);

        let booked =
            create_appointment(&mut c.conn, &c.admin, booking(c.patient, c.house.id, "2025-03-11", "09:00"), fixed_now())
                .unwrap();
        let cleared: AppointmentInput = serde_json::from_value(serde_json::json!({"doctor": null})).unwrap();
        let err = update_appointment(&mut c.conn, booked.appointment.id, cleared, WriteMode::Partial, fixed_now())
            .unwrap_err();
        let ServiceError::Validation(errors) = err else { panic!("expected validation failure") };
        assert!(errors.contains("doctor"));
        assert_eq!(
            get_appointment(&c.conn, booked.appointment.id).unwrap().appointment.doctor_id,
            Some(c.house.id)
        );
    }

    #[test]
    fn missing_fields_are_reported_together() {
        let mut c = clinic();
        let err = create_appointment(&mut c.conn, &c.admin, AppointmentInput::default(), fixed_now()).unwrap_err();
        let ServiceError::Validation(errors) = err else { panic!("expected validation failure") };
        for field in ["patient", "doctor", "appointment_date", "appointment_time", "reason"] {
            assert!(errors.contains(field), "{field} should be reported");
        }
    }

    #[test]
    fn confirm_and_cancel_follow_lifecycle() {
        let mut c = clinic();
        let id = create_appointment(&mut c.conn, &c.admin, booking(c.patient, c.house.id, "2025-03-11", "09:00"), fixed_now())
            .unwrap()
            .appointment
            .id;

        confirm_appointment(&mut c.conn, id, fixed_now()).unwrap();
        confirm_appointment(&mut c.conn, id, fixed_now()).unwrap();
        assert_eq!(get_appointment(&c.conn, id).unwrap().appointment.status, AppointmentStatus::Confirmed);

        cancel_appointment(&mut c.conn, id, fixed_now()).unwrap();
        let refused = confirm_appointment(&mut c.conn, id, fixed_now()).unwrap_err();
        let ServiceError::Validation(errors) = refused else { panic!("expected validation failure") };
        assert_eq!(
            errors.messages("status"),
            ["Cannot change status from \"cancelled\" to \"confirmed\"."]
        );
    }

    #[test]
    fn completed_appointment_cannot_be_cancelled() {
        let mut c = clinic();
        let id = create_appointment(&mut c.conn, &c.admin, booking(c.patient, c.house.id, "2025-03-11", "09:00"), fixed_now())
            .unwrap()
            .appointment
            .id;
        let done: AppointmentInput = serde_json::from_value(serde_json::json!({"status": "completed"})).unwrap();
        update_appointment(&mut c.conn, id, done, WriteMode::Partial, fixed_now()).unwrap();

        assert!(matches!(cancel_appointment(&mut c.conn, id, fixed_now()), Err(ServiceError::Validation(_))));
        assert!(matches!(confirm_appointment(&mut c.conn, 999, fixed_now()), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn update_into_taken_slot_conflicts() {
        let mut c = clinic();
        create_appointment(&mut c.conn, &c.admin, booking(c.patient, c.house.id, "2025-03-11", "09:00"), fixed_now())
            .unwrap();
        let second = create_appointment(&mut c.conn, &c.admin, booking(c.patient, c.house.id, "2025-03-11", "10:00"), fixed_now())
            .unwrap();
        let moved: AppointmentInput =
            serde_json::from_value(serde_json::json!({"appointment_time": "09:00"})).unwrap();
        let err = update_appointment(&mut c.conn, second.appointment.id, moved, WriteMode::Partial, fixed_now());
        assert!(matches!(err, Err(ServiceError::Conflict(_))));
    }

    #[test]
    fn today_upcoming_and_nurse_agenda() {
        let mut c = clinic();
        let mut today = booking(c.patient, c.house.id, "2025-03-10", "15:00");
        today.assigned_nurse = Some(Some(c.nina.id));
        let today_id = create_appointment(&mut c.conn, &c.admin, today, fixed_now()).unwrap().appointment.id;
        create_appointment(&mut c.conn, &c.admin, booking(c.patient, c.house.id, "2025-03-09", "15:00"), fixed_now())
            .unwrap();
        let later = create_appointment(&mut c.conn, &c.admin, booking(c.patient, c.house.id, "2025-03-12", "15:00"), fixed_now())
            .unwrap()
            .appointment
            .id;
        cancel_appointment(&mut c.conn, later, fixed_now()).unwrap();

        let todays = todays_appointments(&c.conn, fixed_now()).unwrap();
        assert_eq!(todays.len(), 1);
        assert_eq!(todays[0].appointment.id, today_id);

        let upcoming = upcoming_appointments(&c.conn, fixed_now()).unwrap();
        assert_eq!(upcoming.iter().map(|v| v.appointment.id).collect::<Vec<_>>(), [today_id]);

        assert_eq!(nurse_agenda(&c.conn, &c.nina, fixed_now()).unwrap().len(), 1);
        assert!(matches!(nurse_agenda(&c.conn, &c.house, fixed_now()), Err(ServiceError::Forbidden(_))));
    }
}
