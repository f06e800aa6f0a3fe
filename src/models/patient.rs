use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::{BloodGroup, Gender};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub patient_id: String,
    #[serde(rename = "user")]
    pub user_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_group: BloodGroup,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relation: String,
    pub allergies: String,
    pub chronic_conditions: String,
    pub current_medications: String,
    pub is_active: bool,
    #[serde(rename = "assigned_nurse")]
    pub assigned_nurse_id: Option<i64>,
    pub registered_date: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Patient {
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }

    pub fn age_on(&self, today: NaiveDate) -> i32 {
        age_on(self.date_of_birth, today)
    }

    /// The writable field set, as currently stored.
    pub fn draft(&self) -> PatientDraft {
        PatientDraft {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            blood_group: self.blood_group,
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip_code: self.zip_code.clone(),
            emergency_contact_name: self.emergency_contact_name.clone(),
            emergency_contact_phone: self.emergency_contact_phone.clone(),
            emergency_contact_relation: self.emergency_contact_relation.clone(),
            allergies: self.allergies.clone(),
            chronic_conditions: self.chronic_conditions.clone(),
            current_medications: self.current_medications.clone(),
            is_active: self.is_active,
            assigned_nurse_id: self.assigned_nurse_id,
        }
    }

    pub fn detail(self, today: NaiveDate) -> PatientDetail {
        PatientDetail {
            age: self.age_on(today),
            full_name: self.full_name(),
            patient: self,
        }
    }

    pub fn summary(&self, today: NaiveDate) -> PatientSummary {
        PatientSummary {
            id: self.id,
            patient_id: self.patient_id.clone(),
            full_name: self.full_name(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            age: self.age_on(today),
            blood_group: self.blood_group,
            is_active: self.is_active,
        }
    }
}

/// Validated writable fields of a patient. System fields (`patient_id`,
/// timestamps, `user`) are never part of a write.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientDraft {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_group: BloodGroup,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relation: String,
    pub allergies: String,
    pub chronic_conditions: String,
    pub current_medications: String,
    pub is_active: bool,
    pub assigned_nurse_id: Option<i64>,
}

/// Full patient representation with derived fields.
#[derive(Debug, Clone, Serialize)]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: Patient,
    pub full_name: String,
    pub age: i32,
}

/// Compact list representation.
#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    pub id: i64,
    pub patient_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub age: i32,
    pub blood_group: BloodGroup,
    pub is_active: bool,
}

pub fn full_name(first_name: &str, last_name: &str) -> String {
    format!("{first_name} {last_name}")
}

/// Completed years between `date_of_birth` and `today`: one less than the
/// year difference while this year's birthday is still ahead.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let birthday_pending =
        (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day());
    today.year() - date_of_birth.year() - i32::from(birthday_pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_day_before_birthday() {
        assert_eq!(age_on(date(2000, 6, 15), date(2024, 6, 14)), 23);
    }

    #[test]
    fn age_on_birthday() {
        assert_eq!(age_on(date(2000, 6, 15), date(2024, 6, 15)), 24);
    }

    #[test]
    fn age_earlier_month_later_day() {
        assert_eq!(age_on(date(2000, 6, 15), date(2024, 5, 30)), 23);
        assert_eq!(age_on(date(2000, 6, 15), date(2024, 7, 1)), 24);
    }

    #[test]
    fn age_leap_day_birthday() {
        assert_eq!(age_on(date(2000, 2, 29), date(2023, 2, 28)), 22);
        assert_eq!(age_on(date(2000, 2, 29), date(2023, 3, 1)), 23);
    }

    #[test]
    fn age_is_stable_across_calls() {
        let dob = date(1990, 12, 31);
        let today = date(2024, 12, 30);
        assert_eq!(age_on(dob, today), age_on(dob, today));
        assert_eq!(age_on(dob, today), 33);
    }

    #[test]
    fn newborn_is_zero() {
        assert_eq!(age_on(date(2024, 3, 1), date(2024, 3, 1)), 0);
    }

    #[test]
    fn full_name_joins_with_single_space() {
        assert_eq!(full_name("Ada", "Lovelace"), "Ada Lovelace");
    }
}
