//! Nurse task list.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;

use crate::authorization::{ensure_allowed, Action};
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{NurseTaskDraft, NurseTaskFilter, NurseTaskView, Role, User};
use crate::validation::{accept, check_patient_reference, check_user_reference, text, time, Form, WriteMode};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NurseTaskInput {
    pub nurse: Option<i64>,
    pub patient: Option<i64>,
    pub title: Option<String>,
    pub scheduled_time: Option<String>,
    pub completed: Option<bool>,
}

fn validate_task(
    conn: &Connection,
    input: NurseTaskInput,
    mut form: Form<'_, NurseTaskDraft>,
) -> ServiceResult<NurseTaskDraft> {
    let nurse_id = form.required("nurse", input.nurse, accept, |t| t.nurse_id);
    let patient_id = form.required("patient", input.patient, accept, |t| t.patient_id);
    let title = form.required("title", input.title, text(255), |t| t.title.clone());
    let scheduled_time = form.required("scheduled_time", input.scheduled_time, time, |t| t.scheduled_time);
    let completed = form.optional("completed", input.completed, accept, |t| t.completed, false);

    check_user_reference(conn, form.errors_mut(), "nurse", nurse_id, Role::Nurse)?;
    if let Some(patient) = patient_id {
        check_patient_reference(conn, form.errors_mut(), "patient", patient)?;
    }

    let draft = form.finish(move || {
        Some(NurseTaskDraft {
            nurse_id: nurse_id?,
            patient_id: patient_id?,
            title: title?,
            scheduled_time: scheduled_time?,
            completed: completed?,
        })
    })?;
    Ok(draft)
}

pub fn create_task(conn: &mut Connection, input: NurseTaskInput, now: NaiveDateTime) -> ServiceResult<NurseTaskView> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let draft = validate_task(&tx, input, Form::create())?;
    let id = repository::insert_nurse_task(&tx, &draft, now)?;
    let view = require_task(&tx, id)?;
    tx.commit()?;

    tracing::info!(task = id, nurse = draft.nurse_id, patient = draft.patient_id, "nurse task created");
    Ok(view)
}

pub fn update_task(
    conn: &mut Connection,
    id: i64,
    input: NurseTaskInput,
    mode: WriteMode,
) -> ServiceResult<NurseTaskView> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let base = require_task(&tx, id)?.task.draft();
    let draft = validate_task(&tx, input, Form::update(mode, &base))?;
    repository::update_nurse_task(&tx, id, &draft)?;
    let view = require_task(&tx, id)?;
    tx.commit()?;
    Ok(view)
}

pub fn get_task(conn: &Connection, id: i64) -> ServiceResult<NurseTaskView> {
    require_task(conn, id)
}

fn require_task(conn: &Connection, id: i64) -> ServiceResult<NurseTaskView> {
    repository::get_nurse_task(conn, id)?.ok_or_else(|| ServiceError::NotFound(format!("NurseTask {id}")))
}

pub fn list_tasks(conn: &Connection, filter: &NurseTaskFilter) -> ServiceResult<Vec<NurseTaskView>> {
    Ok(repository::list_nurse_tasks(conn, filter)?)
}

pub fn delete_task(conn: &Connection, id: i64) -> ServiceResult<()> {
    repository::delete_nurse_task(conn, id)?;
    Ok(())
}

/// Tasks assigned to the calling nurse. Any other role is refused.
pub fn my_tasks(conn: &Connection, actor: &User) -> ServiceResult<Vec<NurseTaskView>> {
    ensure_allowed(actor.role, Action::ViewOwnTasks)?;
    let filter = NurseTaskFilter {
        nurse_id: Some(actor.id),
        ..Default::default()
    };
    list_tasks(conn, &filter)
}
