use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::Role;

/// An authenticated identity. Credentials never leave the db layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub phone: String,
    pub profile_picture: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: NaiveDateTime,
}

impl User {
    /// First and last name separated by a space, trimmed when either is blank.
    pub fn full_name(&self) -> String {
        display_name(&self.first_name, &self.last_name)
    }

    pub fn is_nurse(&self) -> bool {
        self.role == Role::Nurse
    }
}

/// Row to insert into `users`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Name shown for users in related records.
pub fn display_name(first_name: &str, last_name: &str) -> String {
    format!("{first_name} {last_name}").trim().to_string()
}
