//! Shared SQL plumbing for list queries and column decoding.

use std::str::FromStr;

use chrono::{NaiveDateTime, NaiveTime};
use rusqlite::types::{ToSql, Type};
use rusqlite::Row;

/// Stored form of date-times: ISO-8601 without offset, second precision.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Stored form of times of day.
pub const TIME_FORMAT: &str = "%H:%M:%S";

pub fn fmt_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub fn fmt_time(value: &NaiveTime) -> String {
    value.format(TIME_FORMAT).to_string()
}

/// Decode a TEXT column through `FromStr` (dates, times, enums).
pub(crate) fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Dynamic WHERE clause with numbered placeholders (`?1`, `?2`, ...).
#[derive(Default)]
pub(crate) struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl SqlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(&mut self, value: Box<dyn ToSql>) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    pub fn eq<T: ToSql + 'static>(&mut self, column: &str, value: T) {
        let placeholder = self.bind(Box::new(value));
        self.clauses.push(format!("{column} = {placeholder}"));
    }

    pub fn eq_opt<T: ToSql + 'static>(&mut self, column: &str, value: Option<T>) {
        if let Some(value) = value {
            self.eq(column, value);
        }
    }

    pub fn gte<T: ToSql + 'static>(&mut self, column: &str, value: T) {
        let placeholder = self.bind(Box::new(value));
        self.clauses.push(format!("{column} >= {placeholder}"));
    }

    pub fn any_of(&mut self, column: &str, values: Vec<String>) {
        if values.is_empty() {
            return;
        }
        let placeholders: Vec<String> = values
            .into_iter()
            .map(|v| self.bind(Box::new(v)))
            .collect();
        self.clauses
            .push(format!("{column} IN ({})", placeholders.join(", ")));
    }

    /// Every whitespace-separated term must appear (case-insensitively)
    /// in at least one of `columns`.
    pub fn search(&mut self, columns: &[&str], text: Option<&str>) {
        let Some(text) = text else { return };
        for term in text.split_whitespace() {
            let placeholder = self.bind(Box::new(format!("%{}%", escape_like(term))));
            let alternatives: Vec<String> = columns
                .iter()
                .map(|col| format!("{col} LIKE {placeholder} ESCAPE '\\'"))
                .collect();
            self.clauses.push(format!("({})", alternatives.join(" OR ")));
        }
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build an ORDER BY clause from a client `ordering` parameter.
///
/// `allowed` maps public field names to SQL columns. Unknown fields are
/// ignored; when nothing usable remains, `default` is used.
pub(crate) fn order_by(requested: Option<&str>, allowed: &[(&str, &str)], default: &str) -> String {
    let terms: Vec<String> = requested
        .unwrap_or_default()
        .split(',')
        .filter_map(|raw| {
            let raw = raw.trim();
            let (field, direction) = match raw.strip_prefix('-') {
                Some(field) => (field, "DESC"),
                None => (raw, "ASC"),
            };
            allowed
                .iter()
                .find(|(name, _)| *name == field)
                .map(|(_, column)| format!("{column} {direction}"))
        })
        .collect();

    if terms.is_empty() {
        format!(" ORDER BY {default}")
    } else {
        format!(" ORDER BY {}", terms.join(", "))
    }
}
