//! Medical record endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, ApiPath, ApiQuery, CurrentUser, FilterParams};
use crate::models::{MedicalRecordFilter, MedicalRecordView};
use crate::records::{self, MedicalRecordInput};
use crate::validation::WriteMode;

#[derive(Deserialize)]
pub struct RecordQuery {
    pub patient: Option<String>,
    pub doctor: Option<String>,
    pub visit_date: Option<String>,
    pub ordering: Option<String>,
}

/// `GET /api/medical-records/`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<RecordQuery>,
) -> Result<Json<Vec<MedicalRecordView>>, ApiError> {
    let mut params = FilterParams::new();
    let filter = MedicalRecordFilter {
        patient_id: params.id("patient", query.patient),
        doctor_id: params.id("doctor", query.doctor),
        visit_date: params.date("visit_date", query.visit_date),
        ordering: params.text(query.ordering),
    };
    params.finish()?;

    let conn = ctx.core.open_db()?;
    Ok(Json(records::list_records(&conn, &filter)?))
}

/// `POST /api/medical-records/`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    ApiJson(input): ApiJson<MedicalRecordInput>,
) -> Result<(StatusCode, Json<MedicalRecordView>), ApiError> {
    let mut conn = ctx.core.open_db()?;
    let view = records::create_record(&mut conn, &actor, input, ctx.core.now())?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/medical-records/:id/`
pub async fn retrieve(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MedicalRecordView>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(records::get_record(&conn, id)?))
}

/// `PUT /api/medical-records/:id/`
pub async fn replace(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<MedicalRecordInput>,
) -> Result<Json<MedicalRecordView>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    let view = records::update_record(&mut conn, id, input, WriteMode::Replace, ctx.core.now())?;
    Ok(Json(view))
}

/// `PATCH /api/medical-records/:id/`
pub async fn patch(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<MedicalRecordInput>,
) -> Result<Json<MedicalRecordView>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    let view = records::update_record(&mut conn, id, input, WriteMode::Partial, ctx.core.now())?;
    Ok(Json(view))
}

/// `DELETE /api/medical-records/:id/`
pub async fn destroy(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    records::delete_record(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
