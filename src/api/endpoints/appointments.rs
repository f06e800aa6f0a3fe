//! Appointment endpoints, including the dashboard lists and the
//! confirm/cancel actions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, ApiPath, ApiQuery, CurrentUser, FilterParams};
use crate::models::{
    AppointmentDetail, AppointmentFilter, AppointmentStatus, AppointmentSummary, AppointmentType,
    AppointmentView,
};
use crate::scheduling::{self, AppointmentInput};
use crate::validation::WriteMode;

#[derive(Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<String>,
    pub appointment_type: Option<String>,
    pub doctor: Option<String>,
    pub patient: Option<String>,
    pub appointment_date: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// Acknowledgement body for state transitions.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

fn summaries(views: Vec<AppointmentView>) -> Json<Vec<AppointmentSummary>> {
    Json(views.iter().map(AppointmentView::summary).collect())
}

/// `GET /api/appointments/`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<AppointmentQuery>,
) -> Result<Json<Vec<AppointmentSummary>>, ApiError> {
    let mut params = FilterParams::new();
    let filter = AppointmentFilter {
        status: params.choice::<AppointmentStatus>("status", query.status),
        appointment_type: params.choice::<AppointmentType>("appointment_type", query.appointment_type),
        doctor_id: params.id("doctor", query.doctor),
        patient_id: params.id("patient", query.patient),
        appointment_date: params.date("appointment_date", query.appointment_date),
        search: params.text(query.search),
        ordering: params.text(query.ordering),
        ..Default::default()
    };
    params.finish()?;

    let conn = ctx.core.open_db()?;
    Ok(summaries(scheduling::list_appointments(&conn, &filter)?))
}

/// `POST /api/appointments/`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    ApiJson(input): ApiJson<AppointmentInput>,
) -> Result<(StatusCode, Json<AppointmentDetail>), ApiError> {
    let mut conn = ctx.core.open_db()?;
    let now = ctx.core.now();
    let view = scheduling::create_appointment(&mut conn, &actor, input, now)?;
    Ok((StatusCode::CREATED, Json(view.detail(now))))
}

/// `GET /api/appointments/:id/`
pub async fn retrieve(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<AppointmentDetail>, ApiError> {
    let conn = ctx.core.open_db()?;
    let view = scheduling::get_appointment(&conn, id)?;
    Ok(Json(view.detail(ctx.core.now())))
}

/// `PUT /api/appointments/:id/`
pub async fn replace(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<AppointmentInput>,
) -> Result<Json<AppointmentDetail>, ApiError> {
    update(&ctx, id, input, WriteMode::Replace)
}

/// `PATCH /api/appointments/:id/`
pub async fn patch(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<AppointmentInput>,
) -> Result<Json<AppointmentDetail>, ApiError> {
    update(&ctx, id, input, WriteMode::Partial)
}

fn update(
    ctx: &ApiContext,
    id: i64,
    input: AppointmentInput,
    mode: WriteMode,
) -> Result<Json<AppointmentDetail>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    let now = ctx.core.now();
    let view = scheduling::update_appointment(&mut conn, id, input, mode, now)?;
    Ok(Json(view.detail(now)))
}

/// `DELETE /api/appointments/:id/`
pub async fn destroy(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    scheduling::delete_appointment(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/appointments/today/`
pub async fn today(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<Json<Vec<AppointmentSummary>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(summaries(scheduling::todays_appointments(&conn, ctx.core.now())?))
}

/// `GET /api/appointments/upcoming/`
pub async fn upcoming(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<Json<Vec<AppointmentSummary>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(summaries(scheduling::upcoming_appointments(&conn, ctx.core.now())?))
}

/// `GET /api/appointments/nurse-today/`: the calling nurse's agenda.
pub async fn nurse_today(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> Result<Json<Vec<AppointmentSummary>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(summaries(scheduling::nurse_agenda(&conn, &actor, ctx.core.now())?))
}

/// `POST /api/appointments/:id/confirm/`
pub async fn confirm(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<StatusResponse>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    scheduling::confirm_appointment(&mut conn, id, ctx.core.now())?;
    Ok(Json(StatusResponse {
        status: "appointment confirmed",
    }))
}

/// `POST /api/appointments/:id/cancel/`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<StatusResponse>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    scheduling::cancel_appointment(&mut conn, id, ctx.core.now())?;
    Ok(Json(StatusResponse {
        status: "appointment cancelled",
    }))
}
