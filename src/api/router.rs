//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS (when configured) → 2. Auth validator → 3. Audit logger

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::api::endpoints::{appointments, auth, health, medical_records, nurse_tasks, patients};
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router. `cors_origin` allows one browser origin to call
/// the API; without it no CORS headers are sent.
pub fn api_router(core: Arc<CoreState>, cors_origin: Option<&str>) -> Router {
    let router = build_router(ApiContext::new(core));
    match cors_origin.map(cors_layer) {
        Some(Some(cors)) => router.layer(cors),
        _ => router,
    }
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let Ok(origin) = origin.parse::<HeaderValue>() else {
        tracing::warn!(origin, "ignoring malformed CORS origin");
        return None;
    };
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Auth → Audit (innermost) → Handler
    //
    // Extension must be outermost so all middleware can access ApiContext.
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/logout/", post(auth::logout))
        .route("/auth/profile/", get(auth::profile))
        .route("/auth/doctors/", get(auth::doctors))
        .route("/auth/nurses/", get(auth::nurses))
        .route("/auth/users/", get(auth::users))
        .route("/auth/users/:id/", get(auth::user).delete(auth::delete_user))
        .route("/patients/", get(patients::list).post(patients::create))
        .route("/patients/assigned-to-me/", get(patients::assigned_to_me))
        .route(
            "/patients/:id/",
            get(patients::retrieve)
                .put(patients::replace)
                .patch(patients::patch)
                .delete(patients::destroy),
        )
        .route("/patients/:id/medical-records/", get(patients::medical_records))
        .route("/patients/:id/medical_records/", get(patients::medical_records))
        .route("/patients/:id/appointments/", get(patients::appointments))
        .route("/patients/:id/assignment-logs/", get(patients::assignment_logs))
        .route(
            "/medical-records/",
            get(medical_records::list).post(medical_records::create),
        )
        .route(
            "/medical-records/:id/",
            get(medical_records::retrieve)
                .put(medical_records::replace)
                .patch(medical_records::patch)
                .delete(medical_records::destroy),
        )
        .route("/appointments/", get(appointments::list).post(appointments::create))
        .route("/appointments/today/", get(appointments::today))
        .route("/appointments/upcoming/", get(appointments::upcoming))
        .route("/appointments/nurse-today/", get(appointments::nurse_today))
        .route(
            "/appointments/:id/",
            get(appointments::retrieve)
                .put(appointments::replace)
                .patch(appointments::patch)
                .delete(appointments::destroy),
        )
        .route("/appointments/:id/confirm/", post(appointments::confirm))
        .route("/appointments/:id/cancel/", post(appointments::cancel))
        .route("/nurse-tasks/tasks/", get(nurse_tasks::list).post(nurse_tasks::create))
        .route("/nurse-tasks/tasks/my-tasks/", get(nurse_tasks::my_tasks))
        .route(
            "/nurse-tasks/tasks/:id/",
            get(nurse_tasks::retrieve)
                .put(nurse_tasks::replace)
                .patch(nurse_tasks::patch)
                .delete(nurse_tasks::destroy),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    // Open to anonymous callers
    let unprotected = Router::new()
        .route("/health", get(health::check))
        .route("/auth/register/", post(auth::register))
        .route("/auth/signup/", post(auth::signup))
        .route("/accounts/signup/", post(auth::signup))
        .route("/auth/login/", post(auth::login))
        .route("/auth/token/refresh/", post(auth::refresh))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
}
