//! Field-level validation for write payloads.
//!
//! Payloads deserialize into all-`Option` input structs. A [`Form`] merges
//! each supplied value onto the stored one (or onto nothing, on create),
//! runs the field rule, and collects every failure into [`FieldErrors`]
//! keyed by field name so clients get all problems in one response.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::DatabaseError;
use crate::models::Role;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NULL: &str = "This field may not be null.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const DATE_FORMAT_HINT: &str =
    "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";
pub const TIME_FORMAT_HINT: &str =
    "Time has wrong format. Use one of these formats instead: hh:mm[:ss[.uuuuuu]].";
pub const DATETIME_FORMAT_HINT: &str = "Datetime has wrong format. Use one of these formats \
     instead: YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z].";

// ─── Error collection ─────────────────────────────────────────────────────────

/// Messages per field, serialized as `{"field": ["message", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Append every message of `other`.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

// ─── Merging ──────────────────────────────────────────────────────────────────

/// How a write payload relates to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// POST: nothing stored yet.
    Create,
    /// PUT: required fields must be supplied; omitted optional fields keep
    /// their stored value.
    Replace,
    /// PATCH: every omitted field keeps its stored value.
    Partial,
}

/// Collects field values for one write, merging input onto `base`.
pub struct Form<'a, B> {
    mode: WriteMode,
    base: Option<&'a B>,
    errors: FieldErrors,
}

impl<'a, B> Form<'a, B> {
    pub fn create() -> Self {
        Self {
            mode: WriteMode::Create,
            base: None,
            errors: FieldErrors::new(),
        }
    }

    pub fn update(mode: WriteMode, base: &'a B) -> Self {
        Self {
            mode,
            base: Some(base),
            errors: FieldErrors::new(),
        }
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// A field that must end up with a value.
    pub fn required<I, T>(
        &mut self,
        field: &str,
        input: Option<I>,
        rule: impl FnOnce(I) -> Result<T, String>,
        stored: impl FnOnce(&B) -> T,
    ) -> Option<T> {
        match input {
            Some(raw) => self.apply(field, raw, rule),
            None => match (self.mode, self.base) {
                (WriteMode::Partial, Some(base)) => Some(stored(base)),
                _ => {
                    self.errors.add(field, REQUIRED);
                    None
                }
            },
        }
    }

    /// A field with a default. Omitted values keep the stored one on
    /// update and fall back to `default` on create.
    pub fn optional<I, T>(
        &mut self,
        field: &str,
        input: Option<I>,
        rule: impl FnOnce(I) -> Result<T, String>,
        stored: impl FnOnce(&B) -> T,
        default: T,
    ) -> Option<T> {
        match input {
            Some(raw) => self.apply(field, raw, rule),
            None => Some(self.base.map(stored).unwrap_or(default)),
        }
    }

    fn apply<I, T>(
        &mut self,
        field: &str,
        raw: I,
        rule: impl FnOnce(I) -> Result<T, String>,
    ) -> Option<T> {
        match rule(raw) {
            Ok(value) => Some(value),
            Err(message) => {
                self.errors.add(field, message);
                None
            }
        }
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    pub fn errors_mut(&mut self) -> &mut FieldErrors {
        &mut self.errors
    }

    /// Build the validated value once every field rule has passed.
    pub fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> Result<T, FieldErrors> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        build().ok_or_else(|| FieldErrors::single("non_field_errors", "Incomplete submission."))
    }
}

// ─── Field rules ──────────────────────────────────────────────────────────────

/// Non-blank text of at most `max` characters (0 = unbounded).
pub fn text(max: usize) -> impl FnOnce(String) -> Result<String, String> {
    move |raw| {
        let value = raw.trim().to_string();
        if value.is_empty() {
            return Err(BLANK.to_string());
        }
        check_length(value, max)
    }
}

/// Text that may be blank.
pub fn blank_text(max: usize) -> impl FnOnce(String) -> Result<String, String> {
    move |raw| check_length(raw.trim().to_string(), max)
}

fn check_length(value: String, max: usize) -> Result<String, String> {
    if max > 0 && value.chars().count() > max {
        return Err(format!(
            "Ensure this field has no more than {max} characters."
        ));
    }
    Ok(value)
}

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap()
});

pub fn email(raw: String) -> Result<String, String> {
    let value = raw.trim().to_string();
    if value.is_empty() {
        return Err(BLANK.to_string());
    }
    if !EMAIL_PATTERN.is_match(&value) {
        return Err(INVALID_EMAIL.to_string());
    }
    Ok(value)
}

pub fn date(raw: String) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| DATE_FORMAT_HINT.to_string())
}

/// `hh:mm` or `hh:mm:ss[.ffffff]`.
pub fn time(raw: String) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| TIME_FORMAT_HINT.to_string())
}

/// RFC 3339 (the wall-clock time is kept, the offset dropped) or a naive
/// `YYYY-MM-DDThh:mm[:ss]`.
pub fn datetime(raw: String) -> Result<NaiveDateTime, String> {
    let raw = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| DATETIME_FORMAT_HINT.to_string())
}

/// One of an enum's storage strings.
pub fn choice<T: FromStr>(raw: String) -> Result<T, String> {
    raw.parse::<T>()
        .map_err(|_| format!("\"{raw}\" is not a valid choice."))
}

pub fn int_range(min: i64, max: i64) -> impl FnOnce(Option<i64>) -> Result<Option<i32>, String> {
    move |value| match value {
        None => Ok(None),
        Some(v) if v < min => Err(format!(
            "Ensure this value is greater than or equal to {min}."
        )),
        Some(v) if v > max => Err(format!(
            "Ensure this value is less than or equal to {max}."
        )),
        Some(v) => i32::try_from(v)
            .map(Some)
            .map_err(|_| "A valid integer is required.".to_string()),
    }
}

/// Up to `max_digits` significant digits with `places` decimal places.
pub fn decimal(max_digits: u32, places: u32) -> impl FnOnce(Option<f64>) -> Result<Option<f64>, String> {
    move |value| {
        let Some(v) = value else { return Ok(None) };
        if !v.is_finite() {
            return Err("A valid number is required.".to_string());
        }
        let scale = 10f64.powi(places as i32);
        let scaled = v * scale;
        if (scaled - scaled.round()).abs() > 1e-6 {
            return Err(format!(
                "Ensure that there are no more than {places} decimal places."
            ));
        }
        let limit = 10f64.powi((max_digits - places) as i32);
        if v.abs() >= limit {
            return Err(format!(
                "Ensure that there are no more than {max_digits} digits in total."
            ));
        }
        Ok(Some(scaled.round() / scale))
    }
}

/// Rule for values that need no checking.
pub fn accept<T>(value: T) -> Result<T, String> {
    Ok(value)
}

/// Rule for nullable columns the client must still fill: rejects an
/// explicit `null` while keeping the stored shape.
pub fn not_null<T>(value: Option<T>) -> Result<Option<T>, String> {
    match value {
        Some(v) => Ok(Some(v)),
        None => Err(NULL.to_string()),
    }
}

/// Distinguish an explicit `null` (`Some(None)`) from an omitted field
/// (`None`). Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ─── References ───────────────────────────────────────────────────────────────

fn missing_reference(id: i64) -> String {
    format!("Invalid pk \"{id}\" - object does not exist.")
}

/// A user reference must exist and carry `role`.
pub fn check_user_reference(
    conn: &Connection,
    errors: &mut FieldErrors,
    field: &str,
    user_id: Option<i64>,
    role: Role,
) -> Result<(), DatabaseError> {
    let Some(id) = user_id else { return Ok(()) };
    let found: Option<String> = conn
        .query_row("SELECT role FROM users WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    if found.as_deref() != Some(role.as_str()) {
        errors.add(field, missing_reference(id));
    }
    Ok(())
}

pub fn check_patient_reference(
    conn: &Connection,
    errors: &mut FieldErrors,
    field: &str,
    patient_id: i64,
) -> Result<(), DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?1)",
        params![patient_id],
        |row| row.get(0),
    )?;
    if !exists {
        errors.add(field, missing_reference(patient_id));
    }
    Ok(())
}
