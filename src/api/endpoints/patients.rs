//! Patient registry endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, ApiPath, ApiQuery, CurrentUser, FilterParams};
use crate::models::{
    AppointmentSummary, BloodGroup, Gender, MedicalRecordView, PatientAssignmentLog, PatientDetail,
    PatientFilter, PatientSummary,
};
use crate::patients::{self, PatientInput};
use crate::validation::WriteMode;

#[derive(Deserialize)]
pub struct PatientQuery {
    pub blood_group: Option<String>,
    pub gender: Option<String>,
    pub is_active: Option<String>,
    pub user: Option<String>,
    pub assigned_nurse: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl PatientQuery {
    fn into_filter(self) -> Result<PatientFilter, ApiError> {
        let mut params = FilterParams::new();
        let filter = PatientFilter {
            blood_group: params.choice::<BloodGroup>("blood_group", self.blood_group),
            gender: params.choice::<Gender>("gender", self.gender),
            is_active: params.boolean("is_active", self.is_active),
            user_id: params.id("user", self.user),
            assigned_nurse_id: params.id("assigned_nurse", self.assigned_nurse),
            search: params.text(self.search),
            ordering: params.text(self.ordering),
        };
        params.finish()?;
        Ok(filter)
    }
}

/// `GET /api/patients/`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<PatientQuery>,
) -> Result<Json<Vec<PatientSummary>>, ApiError> {
    let filter = query.into_filter()?;
    let conn = ctx.core.open_db()?;
    let today = ctx.core.now().date();
    let patients = patients::list_patients(&conn, &filter)?;
    Ok(Json(patients.iter().map(|p| p.summary(today)).collect()))
}

/// `POST /api/patients/`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    ApiJson(input): ApiJson<PatientInput>,
) -> Result<(StatusCode, Json<PatientDetail>), ApiError> {
    let mut conn = ctx.core.open_db()?;
    let now = ctx.core.now();
    let patient = patients::create_patient(&mut conn, &actor, input, now)?;
    Ok((StatusCode::CREATED, Json(patient.detail(now.date()))))
}

/// `GET /api/patients/:id/`
pub async fn retrieve(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PatientDetail>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = patients::get_patient(&conn, id)?;
    Ok(Json(patient.detail(ctx.core.now().date())))
}

/// `PUT /api/patients/:id/`
pub async fn replace(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<PatientInput>,
) -> Result<Json<PatientDetail>, ApiError> {
    update(&ctx, &actor, id, input, WriteMode::Replace)
}

/// `PATCH /api/patients/:id/`
pub async fn patch(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<PatientInput>,
) -> Result<Json<PatientDetail>, ApiError> {
    update(&ctx, &actor, id, input, WriteMode::Partial)
}

fn update(
    ctx: &ApiContext,
    actor: &crate::models::User,
    id: i64,
    input: PatientInput,
    mode: WriteMode,
) -> Result<Json<PatientDetail>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    let now = ctx.core.now();
    let patient = patients::update_patient(&mut conn, actor, id, input, mode, now)?;
    Ok(Json(patient.detail(now.date())))
}

/// `DELETE /api/patients/:id/`
pub async fn destroy(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    patients::delete_patient(&conn, &actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/patients/:id/medical_records/` (also `medical-records/`)
pub async fn medical_records(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<MedicalRecordView>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(patients::patient_medical_records(&conn, id)?))
}

/// `GET /api/patients/:id/appointments/`
pub async fn appointments(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<AppointmentSummary>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let views = patients::patient_appointments(&conn, id)?;
    Ok(Json(views.iter().map(|v| v.summary()).collect()))
}

/// `GET /api/patients/:id/assignment-logs/`
pub async fn assignment_logs(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<PatientAssignmentLog>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(patients::assignment_history(&conn, id)?))
}

/// `GET /api/patients/assigned-to-me/`: nurses only.
pub async fn assigned_to_me(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> Result<Json<Vec<PatientSummary>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let today = ctx.core.now().date();
    let patients = patients::assigned_to_me(&conn, &actor)?;
    Ok(Json(patients.iter().map(|p| p.summary(today)).collect()))
}
