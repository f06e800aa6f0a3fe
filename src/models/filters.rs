use chrono::NaiveDate;

use super::enums::{AppointmentStatus, AppointmentType, BloodGroup, Gender, Role};

#[derive(Debug, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
}

#[derive(Debug, Default)]
pub struct PatientFilter {
    pub blood_group: Option<BloodGroup>,
    pub gender: Option<Gender>,
    pub is_active: Option<bool>,
    pub user_id: Option<i64>,
    pub assigned_nurse_id: Option<i64>,
    /// Whitespace-separated terms; each must match a name, ID, email or phone.
    pub search: Option<String>,
    /// Comma-separated field names, `-` prefix for descending.
    pub ordering: Option<String>,
}

#[derive(Debug, Default)]
pub struct MedicalRecordFilter {
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub visit_date: Option<NaiveDate>,
    pub ordering: Option<String>,
}

#[derive(Debug, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    /// Matches any of the listed statuses; combined with `status` by AND.
    pub statuses: Vec<AppointmentStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub doctor_id: Option<i64>,
    pub patient_id: Option<i64>,
    pub assigned_nurse_id: Option<i64>,
    pub appointment_date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Default)]
pub struct NurseTaskFilter {
    pub nurse_id: Option<i64>,
    pub patient_id: Option<i64>,
    pub completed: Option<bool>,
    pub search: Option<String>,
}
