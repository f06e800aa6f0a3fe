//! Errors raised by the domain services.

use thiserror::Error;

use crate::authorization::{denial_message, Action};
use crate::crypto::PasswordError;
use crate::db::DatabaseError;
use crate::validation::FieldErrors;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Token expired")]
    TokenExpired,

    #[error("Constraint violated: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
}

impl ServiceError {
    pub fn forbidden(action: Action) -> Self {
        Self::Forbidden(denial_message(action))
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                Self::NotFound(format!("{entity_type} {id}"))
            }
            DatabaseError::ConstraintViolation(detail) => Self::Conflict(detail),
            other => Self::Database(other),
        }
    }
}

/// Transactions surface raw SQLite errors; classify them like the repository does.
impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

impl From<FieldErrors> for ServiceError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_lifted_out_of_database_errors() {
        let err: ServiceError = DatabaseError::not_found("Patient", 4).into();
        assert!(matches!(err, ServiceError::NotFound(ref what) if what == "Patient 4"));
    }

    #[test]
    fn constraint_violation_becomes_conflict() {
        let err: ServiceError = DatabaseError::ConstraintViolation("UNIQUE".into()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn forbidden_carries_policy_message() {
        let err = ServiceError::forbidden(Action::ViewOwnTasks);
        assert_eq!(err.to_string(), "Forbidden: Only nurses can view their tasks.");
    }
}
