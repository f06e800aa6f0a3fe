use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::enums::{AppointmentStatus, AppointmentType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub appointment_id: String,
    #[serde(rename = "patient")]
    pub patient_id: i64,
    /// `None` once the doctor's account has been deleted.
    #[serde(rename = "doctor")]
    pub doctor_id: Option<i64>,
    #[serde(rename = "assigned_nurse")]
    pub assigned_nurse_id: Option<i64>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    /// Minutes.
    pub duration: i32,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: String,
    #[serde(rename = "created_by")]
    pub created_by_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.appointment_date.and_time(self.appointment_time)
    }

    pub fn is_upcoming_at(&self, now: NaiveDateTime) -> bool {
        is_upcoming(self.appointment_date, self.appointment_time, self.status, now)
    }

    pub fn draft(&self) -> AppointmentDraft {
        AppointmentDraft {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            assigned_nurse_id: self.assigned_nurse_id,
            appointment_date: self.appointment_date,
            appointment_time: self.appointment_time,
            duration: self.duration,
            appointment_type: self.appointment_type,
            status: self.status,
            reason: self.reason.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// True when the slot lies strictly in the future and the visit is still
/// expected to happen.
pub fn is_upcoming(
    date: NaiveDate,
    time: NaiveTime,
    status: AppointmentStatus,
    now: NaiveDateTime,
) -> bool {
    date.and_time(time) > now && status.is_pending_visit()
}

/// Validated writable fields of an appointment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentDraft {
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    pub assigned_nurse_id: Option<i64>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub duration: i32,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: String,
}

/// An appointment joined with the display names of its participants.
#[derive(Debug, Clone)]
pub struct AppointmentView {
    pub appointment: Appointment,
    pub patient_name: String,
    pub patient_phone: String,
    pub doctor_name: Option<String>,
}

impl AppointmentView {
    pub fn detail(self, now: NaiveDateTime) -> AppointmentDetail {
        AppointmentDetail {
            is_upcoming: self.appointment.is_upcoming_at(now),
            patient_name: self.patient_name,
            doctor_name: self.doctor_name,
            appointment: self.appointment,
        }
    }

    pub fn summary(&self) -> AppointmentSummary {
        AppointmentSummary {
            id: self.appointment.id,
            appointment_id: self.appointment.appointment_id.clone(),
            patient_name: self.patient_name.clone(),
            patient_phone: self.patient_phone.clone(),
            doctor_name: self.doctor_name.clone(),
            appointment_date: self.appointment.appointment_date,
            appointment_time: self.appointment.appointment_time,
            status: self.appointment.status,
            appointment_type: self.appointment.appointment_type,
        }
    }
}

/// Full appointment representation with derived fields.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: Option<String>,
    pub is_upcoming: bool,
}

/// Compact list representation.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentSummary {
    pub id: i64,
    pub appointment_id: String,
    pub patient_name: String,
    pub patient_phone: String,
    pub doctor_name: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn nine_am() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn scheduled_tomorrow_is_upcoming() {
        let tomorrow = now().date() + Duration::days(1);
        assert!(is_upcoming(tomorrow, nine_am(), AppointmentStatus::Scheduled, now()));
        assert!(is_upcoming(tomorrow, nine_am(), AppointmentStatus::Confirmed, now()));
    }

    #[test]
    fn completed_tomorrow_is_not_upcoming() {
        let tomorrow = now().date() + Duration::days(1);
        assert!(!is_upcoming(tomorrow, nine_am(), AppointmentStatus::Completed, now()));
        assert!(!is_upcoming(tomorrow, nine_am(), AppointmentStatus::Cancelled, now()));
    }

    #[test]
    fn yesterday_is_never_upcoming() {
        let yesterday = now().date() - Duration::days(1);
        for status in AppointmentStatus::ALL {
            assert!(!is_upcoming(yesterday, nine_am(), *status, now()));
        }
    }

    #[test]
    fn same_instant_is_not_strictly_future() {
        let t = now().time();
        assert!(!is_upcoming(now().date(), t, AppointmentStatus::Scheduled, now()));
        let later = t + Duration::minutes(1);
        assert!(is_upcoming(now().date(), later, AppointmentStatus::Scheduled, now()));
    }
}
