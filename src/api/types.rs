//! Shared types for the API layer: router state, the authenticated-user
//! extension and extractors whose rejections render as [`ApiError`].

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::User;
use crate::validation::FieldErrors;

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// The authenticated caller, injected into request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

// ═══════════════════════════════════════════════════════════
// Extractors
// ═══════════════════════════════════════════════════════════

/// `Json` whose rejection is a `BAD_REQUEST` error body.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Path` whose rejection is a `BAD_REQUEST` error body.
pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection is a `BAD_REQUEST` error body.
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

// ═══════════════════════════════════════════════════════════
// Query parameter parsing
// ═══════════════════════════════════════════════════════════

/// Typed reads of raw filter parameters. Blank values mean "no filter";
/// malformed ones are collected as field errors.
#[derive(Default)]
pub struct FilterParams {
    errors: FieldErrors,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    fn present(raw: Option<String>) -> Option<String> {
        raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    /// A value parsed with `FromStr` (enums, dates).
    pub fn parse<T: FromStr>(&mut self, field: &str, raw: Option<String>, message: &str) -> Option<T> {
        let value = Self::present(raw)?;
        match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.errors.add(field, message.replace("{value}", &value));
                None
            }
        }
    }

    pub fn choice<T: FromStr>(&mut self, field: &str, raw: Option<String>) -> Option<T> {
        self.parse(
            field,
            raw,
            "Select a valid choice. {value} is not one of the available choices.",
        )
    }

    pub fn id(&mut self, field: &str, raw: Option<String>) -> Option<i64> {
        self.parse(field, raw, "Enter a whole number.")
    }

    pub fn date(&mut self, field: &str, raw: Option<String>) -> Option<chrono::NaiveDate> {
        self.parse(field, raw, "Enter a valid date.")
    }

    /// `true`/`false` in any case, or `1`/`0`.
    pub fn boolean(&mut self, field: &str, raw: Option<String>) -> Option<bool> {
        let value = Self::present(raw)?;
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => {
                self.errors.add(field, "Enter a valid boolean.");
                None
            }
        }
    }

    pub fn text(&mut self, raw: Option<String>) -> Option<String> {
        Self::present(raw)
    }

    pub fn finish(self) -> Result<(), ApiError> {
        self.errors.into_result().map_err(ApiError::Validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BloodGroup;

    #[test]
    fn blank_params_are_ignored() {
        let mut params = FilterParams::new();
        assert_eq!(params.id("patient", Some("  ".into())), None);
        assert_eq!(params.boolean("is_active", None), None);
        assert!(params.finish().is_ok());
    }

    #[test]
    fn malformed_params_are_collected() {
        let mut params = FilterParams::new();
        assert_eq!(params.choice::<BloodGroup>("blood_group", Some("Z".into())), None);
        assert_eq!(params.id("doctor", Some("abc".into())), None);
        assert_eq!(params.boolean("completed", Some("maybe".into())), None);
        let Err(ApiError::Validation(errors)) = params.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.messages("blood_group"),
            ["Select a valid choice. Z is not one of the available choices."]
        );
        assert!(errors.contains("doctor"));
        assert!(errors.contains("completed"));
    }

    #[test]
    fn well_formed_params_parse() {
        let mut params = FilterParams::new();
        assert_eq!(params.choice::<BloodGroup>("blood_group", Some("AB-".into())), Some(BloodGroup::AbNegative));
        assert_eq!(params.boolean("is_active", Some("False".into())), Some(false));
        assert_eq!(params.date("visit_date", Some("2025-03-10".into())).map(|d| d.to_string()).as_deref(), Some("2025-03-10"));
        assert!(params.finish().is_ok());
    }
}
