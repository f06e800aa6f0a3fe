//! Nurse task endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, ApiPath, ApiQuery, CurrentUser, FilterParams};
use crate::models::{NurseTaskFilter, NurseTaskView};
use crate::nurse_tasks::{self, NurseTaskInput};
use crate::validation::WriteMode;

#[derive(Deserialize)]
pub struct TaskQuery {
    pub nurse: Option<String>,
    pub patient: Option<String>,
    pub completed: Option<String>,
    pub search: Option<String>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<TaskQuery>,
) -> Result<Json<Vec<NurseTaskView>>, ApiError> {
    let mut params = FilterParams::new();
    let filter = NurseTaskFilter {
        nurse_id: params.id("nurse", query.nurse),
        patient_id: params.id("patient", query.patient),
        completed: params.boolean("completed", query.completed),
        search: params.text(query.search),
    };
    params.finish()?;

    let conn = ctx.core.open_db()?;
    Ok(Json(nurse_tasks::list_tasks(&conn, &filter)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiJson(input): ApiJson<NurseTaskInput>,
) -> Result<(StatusCode, Json<NurseTaskView>), ApiError> {
    let mut conn = ctx.core.open_db()?;
    let view = nurse_tasks::create_task(&mut conn, input, ctx.core.now())?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn retrieve(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<NurseTaskView>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(nurse_tasks::get_task(&conn, id)?))
}

pub async fn replace(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<NurseTaskInput>,
) -> Result<Json<NurseTaskView>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    Ok(Json(nurse_tasks::update_task(&mut conn, id, input, WriteMode::Replace)?))
}

pub async fn patch(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<NurseTaskInput>,
) -> Result<Json<NurseTaskView>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    Ok(Json(nurse_tasks::update_task(&mut conn, id, input, WriteMode::Partial)?))
}

pub async fn destroy(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    nurse_tasks::delete_task(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/nurse-tasks/tasks/my-tasks/`
pub async fn my_tasks(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> Result<Json<Vec<NurseTaskView>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(nurse_tasks::my_tasks(&conn, &actor)?))
}
