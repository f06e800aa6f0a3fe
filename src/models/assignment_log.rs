use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One nurse-to-patient assignment event. Rows are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientAssignmentLog {
    pub id: i64,
    #[serde(rename = "patient")]
    pub patient_id: i64,
    /// `None` when the assignment cleared the nurse, or the nurse was deleted.
    #[serde(rename = "assigned_nurse")]
    pub assigned_nurse_id: Option<i64>,
    #[serde(rename = "assigned_by")]
    pub assigned_by_id: Option<i64>,
    pub timestamp: NaiveDateTime,
}
