use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: i64,
    #[serde(rename = "patient")]
    pub patient_id: i64,
    #[serde(rename = "doctor")]
    pub doctor_id: Option<i64>,
    pub visit_date: NaiveDateTime,
    pub diagnosis: String,
    pub symptoms: String,
    pub prescription: String,
    pub lab_results: String,
    pub notes: String,
    pub blood_pressure: String,
    /// One decimal place.
    pub temperature: Option<f64>,
    pub heart_rate: Option<i32>,
    pub respiratory_rate: Option<i32>,
    pub oxygen_saturation: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl MedicalRecord {
    pub fn draft(&self) -> MedicalRecordDraft {
        MedicalRecordDraft {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            visit_date: self.visit_date,
            diagnosis: self.diagnosis.clone(),
            symptoms: self.symptoms.clone(),
            prescription: self.prescription.clone(),
            lab_results: self.lab_results.clone(),
            notes: self.notes.clone(),
            blood_pressure: self.blood_pressure.clone(),
            temperature: self.temperature,
            heart_rate: self.heart_rate,
            respiratory_rate: self.respiratory_rate,
            oxygen_saturation: self.oxygen_saturation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MedicalRecordDraft {
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    pub visit_date: NaiveDateTime,
    pub diagnosis: String,
    pub symptoms: String,
    pub prescription: String,
    pub lab_results: String,
    pub notes: String,
    pub blood_pressure: String,
    pub temperature: Option<f64>,
    pub heart_rate: Option<i32>,
    pub respiratory_rate: Option<i32>,
    pub oxygen_saturation: Option<i32>,
}

/// A record joined with patient and doctor display names.
#[derive(Debug, Clone, Serialize)]
pub struct MedicalRecordView {
    #[serde(flatten)]
    pub record: MedicalRecord,
    pub patient_name: String,
    pub doctor_name: Option<String>,
}
