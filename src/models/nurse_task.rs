use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NurseTask {
    pub id: i64,
    #[serde(rename = "nurse")]
    pub nurse_id: i64,
    #[serde(rename = "patient")]
    pub patient_id: i64,
    pub title: String,
    pub scheduled_time: NaiveTime,
    pub completed: bool,
    pub created_at: NaiveDateTime,
}

impl NurseTask {
    pub fn draft(&self) -> NurseTaskDraft {
        NurseTaskDraft {
            nurse_id: self.nurse_id,
            patient_id: self.patient_id,
            title: self.title.clone(),
            scheduled_time: self.scheduled_time,
            completed: self.completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NurseTaskDraft {
    pub nurse_id: i64,
    pub patient_id: i64,
    pub title: String,
    pub scheduled_time: NaiveTime,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NurseTaskView {
    #[serde(flatten)]
    pub task: NurseTask,
    pub nurse_name: String,
    pub patient_name: String,
}
