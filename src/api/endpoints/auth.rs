//! Account endpoints: registration, signup, token sessions and user
//! administration.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::accounts::{self, LoginInput, RegisterInput, Session, SignupInput, SignupResult};
use crate::api::error::ApiError;
use crate::api::middleware::auth::bearer_token;
use crate::api::types::{ApiContext, ApiJson, ApiPath, ApiQuery, CurrentUser, FilterParams};
use crate::models::{Role, User};
use crate::validation::REQUIRED;

/// `POST /api/auth/register/`: create an account. Open to anonymous
/// callers; a bearer token, when sent, identifies the registering admin.
pub async fn register(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<RegisterInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let conn = ctx.core.open_db()?;
    let now = ctx.core.now();
    let caller = match bearer_token(&headers) {
        Some(token) => Some(accounts::authenticate(&conn, token, now)?),
        None => None,
    };
    let user = accounts::register(&conn, caller.as_ref(), input, now)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/auth/signup/`: patient self-signup.
pub async fn signup(
    State(ctx): State<ApiContext>,
    ApiJson(input): ApiJson<SignupInput>,
) -> Result<(StatusCode, Json<SignupResult>), ApiError> {
    let mut conn = ctx.core.open_db()?;
    let result = accounts::signup_patient(&mut conn, input, ctx.core.now())?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// `POST /api/auth/login/` → `{access, refresh, user}`.
pub async fn login(
    State(ctx): State<ApiContext>,
    ApiJson(input): ApiJson<LoginInput>,
) -> Result<Json<Session>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    let session = accounts::login(&mut conn, input, ctx.core.token_lifetimes(), ctx.core.now())?;
    Ok(Json(session))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// `POST /api/auth/token/refresh/` → `{access}`.
pub async fn refresh(
    State(ctx): State<ApiContext>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let token = body
        .refresh
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::field("refresh", REQUIRED))?;
    let conn = ctx.core.open_db()?;
    let access = accounts::refresh_access(&conn, &token, ctx.core.token_lifetimes(), ctx.core.now())?;
    Ok(Json(RefreshResponse { access }))
}

/// `POST /api/auth/logout/`: revoke the caller's tokens.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    accounts::logout(&conn, &user)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/profile/`
pub async fn profile(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<User> {
    Json(user)
}

/// `GET /api/auth/doctors/`
pub async fn doctors(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<Json<Vec<User>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::list_users(&conn, Some(Role::Doctor))?))
}

/// `GET /api/auth/nurses/`
pub async fn nurses(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<Json<Vec<User>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::list_users(&conn, Some(Role::Nurse))?))
}

#[derive(Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
}

/// `GET /api/auth/users/?role=`
pub async fn users(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let mut params = FilterParams::new();
    let role = params.choice::<Role>("role", query.role);
    params.finish()?;

    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::list_users(&conn, role)?))
}

/// `GET /api/auth/users/:id/`
pub async fn user(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::get_user(&conn, id)?))
}

/// `DELETE /api/auth/users/:id/`: administrators only.
pub async fn delete_user(
    State(ctx): State<ApiContext>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    accounts::delete_user(&conn, &actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}
