//! Shared fixtures for in-source tests.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;

use crate::db::repository::{create_patient, insert_user};
use crate::models::*;

/// Monday 2025-03-10 12:00:00.
pub fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 10)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn seed_user(conn: &Connection, username: &str, role: Role) -> i64 {
    insert_user(
        conn,
        &NewUser {
            username: username.into(),
            email: format!("{username}@hms.test"),
            password_hash: "unused".into(),
            role,
            first_name: username.into(),
            last_name: "Test".into(),
            phone: String::new(),
        },
        fixed_now(),
    )
    .unwrap()
}

pub fn patient_draft(email: &str) -> PatientDraft {
    PatientDraft {
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        date_of_birth: date(1990, 4, 12),
        gender: Gender::Female,
        blood_group: BloodGroup::OPositive,
        email: email.into(),
        phone: "5550100".into(),
        address: "1 Main St".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        zip_code: "62701".into(),
        emergency_contact_name: "John Doe".into(),
        emergency_contact_phone: "5550101".into(),
        emergency_contact_relation: "Spouse".into(),
        allergies: String::new(),
        chronic_conditions: String::new(),
        current_medications: String::new(),
        is_active: true,
        assigned_nurse_id: None,
    }
}

pub fn seed_patient(conn: &Connection, email: &str) -> Patient {
    create_patient(conn, None, &patient_draft(email), fixed_now()).unwrap()
}

pub fn appointment_draft(
    patient_id: i64,
    doctor_id: Option<i64>,
    day: NaiveDate,
    at: NaiveTime,
) -> AppointmentDraft {
    AppointmentDraft {
        patient_id,
        doctor_id,
        assigned_nurse_id: None,
        appointment_date: day,
        appointment_time: at,
        duration: 30,
        appointment_type: AppointmentType::Consultation,
        status: AppointmentStatus::Scheduled,
        reason: "Checkup".into(),
        notes: String::new(),
    }
}
