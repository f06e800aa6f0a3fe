//! Accounts: registration, patient self-signup, bearer-token sessions and
//! user administration.
//!
//! Tokens are opaque random strings handed to the client once. Only their
//! SHA-256 digests are stored, each with a kind (`access` / `refresh`) and
//! an expiry. Authentication looks the digest up and checks both.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::authorization::{ensure_allowed, Action};
use crate::config::BootstrapAdmin;
use crate::crypto::{generate_token, hash_password, hash_token, password_problems, verify_password};
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{NewUser, Patient, Role, TokenKind, User, UserFilter};
use crate::patients::{validate_patient, PatientInput};
use crate::validation::{blank_text, choice, email, text, FieldErrors, Form, REQUIRED};

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const PASSWORD_MISMATCH: &str = "Password fields didn't match.";

/// How long issued tokens stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

// ─── Payloads ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterInput {
    pub username: Option<String>,
    pub password: Option<String>,
    pub password2: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
}

/// A full patient profile plus credentials. `username` defaults to the email.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupInput {
    pub username: Option<String>,
    pub password: Option<String>,
    pub password2: Option<String>,
    #[serde(flatten)]
    pub profile: PatientInput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub access: String,
    pub refresh: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct SignupResult {
    pub user: User,
    pub patient: Patient,
}

// ─── Registration ──────────────────────────────────────────────────────────

/// Check `password`/`password2` and the strength policy, recording
/// problems under `password`.
fn check_passwords(
    errors: &mut FieldErrors,
    password: Option<&str>,
    password2: Option<&str>,
    password2_required: bool,
    username: &str,
) {
    let Some(password) = password else {
        errors.add("password", REQUIRED);
        return;
    };
    match password2 {
        Some(confirm) if confirm != password => errors.add("password", PASSWORD_MISMATCH),
        None if password2_required => errors.add("password2", REQUIRED),
        _ => {}
    }
    for problem in password_problems(password, username) {
        errors.add("password", problem);
    }
}

/// Create a staff or patient account. Only an administrator may create
/// another administrator.
pub fn register(
    conn: &Connection,
    caller: Option<&User>,
    input: RegisterInput,
    now: NaiveDateTime,
) -> ServiceResult<User> {
    let mut form: Form<'_, NewUser> = Form::create();
    let username = form.required("username", input.username, text(USERNAME_MAX_LENGTH), |u| u.username.clone());
    let email = form.optional(
        "email",
        input.email.filter(|e| !e.trim().is_empty()),
        email,
        |u| u.email.clone(),
        String::new(),
    );
    let first_name = form.optional("first_name", input.first_name, blank_text(150), |u| u.first_name.clone(), String::new());
    let last_name = form.optional("last_name", input.last_name, blank_text(150), |u| u.last_name.clone(), String::new());
    let phone = form.optional("phone", input.phone, blank_text(15), |u| u.phone.clone(), String::new());
    let role = form.optional("role", input.role, choice::<Role>, |u| u.role, Role::Patient);

    check_passwords(
        form.errors_mut(),
        input.password.as_deref(),
        input.password2.as_deref(),
        true,
        username.as_deref().unwrap_or_default(),
    );

    if role == Some(Role::Admin) {
        match caller {
            Some(user) => {
                ensure_allowed(user.role, Action::CreateAdmin)?;
            }
            None => return Err(ServiceError::forbidden(Action::CreateAdmin)),
        }
    }

    let password = input.password.unwrap_or_default();
    let new_user = form.finish(move || {
        Some(NewUser {
            username: username?,
            email: email?,
            password_hash: hash_password(&password),
            role: role?,
            first_name: first_name?,
            last_name: last_name?,
            phone: phone?,
        })
    })?;

    let id = repository::insert_user(conn, &new_user, now)?;
    tracing::info!(user = id, role = %new_user.role, "account registered");
    require_user(conn, id)
}

/// Patient self-signup: the `patient` account and its linked patient row
/// are created together or not at all.
pub fn signup_patient(conn: &mut Connection, input: SignupInput, now: NaiveDateTime) -> ServiceResult<SignupResult> {
    let SignupInput {
        username,
        password,
        password2,
        mut profile,
    } = input;
    // Self-registered patients cannot pick a nurse or deactivate themselves.
    profile.assigned_nurse = None;
    profile.is_active = None;

    let username = username
        .filter(|u| !u.trim().is_empty())
        .or_else(|| profile.email.clone())
        .map(|u| u.trim().to_string());

    let mut errors = FieldErrors::new();
    match username.as_deref() {
        Some(name) if name.chars().count() > USERNAME_MAX_LENGTH => errors.add(
            "username",
            format!("Ensure this field has no more than {USERNAME_MAX_LENGTH} characters."),
        ),
        Some(_) => {}
        None => errors.add("username", REQUIRED),
    }
    check_passwords(
        &mut errors,
        password.as_deref(),
        password2.as_deref(),
        false,
        username.as_deref().unwrap_or_default(),
    );

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let draft = match validate_patient(&tx, profile, Form::create()) {
        Ok(draft) => Some(draft),
        Err(ServiceError::Validation(profile_errors)) => {
            errors.merge(profile_errors);
            None
        }
        Err(other) => return Err(other),
    };
    errors.into_result()?;
    let (Some(draft), Some(username), Some(password)) = (draft, username, password) else {
        return Err(ServiceError::field("non_field_errors", "Incomplete submission."));
    };

    let user_id = repository::insert_user(
        &tx,
        &NewUser {
            username,
            email: draft.email.clone(),
            password_hash: hash_password(&password),
            role: Role::Patient,
            first_name: draft.first_name.clone(),
            last_name: draft.last_name.clone(),
            phone: draft.phone.clone(),
        },
        now,
    )?;
    let patient = repository::create_patient(&tx, Some(user_id), &draft, now)?;
    let user = require_user(&tx, user_id)?;
    tx.commit()?;

    tracing::info!(user = user_id, patient_id = %patient.patient_id, "patient signed up");
    Ok(SignupResult { user, patient })
}

// ─── Sessions ──────────────────────────────────────────────────────────────

fn issue_token(
    conn: &Connection,
    user_id: i64,
    kind: TokenKind,
    ttl: Duration,
    now: NaiveDateTime,
) -> ServiceResult<String> {
    let token = generate_token();
    repository::insert_token(conn, &hash_token(&token), user_id, kind, now, now + ttl)?;
    Ok(token)
}

/// Exchange credentials for an access/refresh token pair.
pub fn login(
    conn: &mut Connection,
    input: LoginInput,
    lifetimes: TokenLifetimes,
    now: NaiveDateTime,
) -> ServiceResult<Session> {
    let mut errors = FieldErrors::new();
    if input.username.as_deref().map_or(true, |u| u.is_empty()) {
        errors.add("username", REQUIRED);
    }
    if input.password.as_deref().map_or(true, |p| p.is_empty()) {
        errors.add("password", REQUIRED);
    }
    errors.into_result()?;
    let username = input.username.unwrap_or_default();
    let password = input.password.unwrap_or_default();

    let Some((user, stored_hash)) = repository::get_credentials(conn, &username)? else {
        tracing::warn!("login failed: unknown username");
        return Err(ServiceError::InvalidCredentials);
    };
    if !verify_password(&password, &stored_hash)? {
        tracing::warn!(user = user.id, "login failed: wrong password");
        return Err(ServiceError::InvalidCredentials);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let pruned = repository::prune_expired_tokens(&tx, now)?;
    let access = issue_token(&tx, user.id, TokenKind::Access, lifetimes.access, now)?;
    let refresh = issue_token(&tx, user.id, TokenKind::Refresh, lifetimes.refresh, now)?;
    tx.commit()?;

    tracing::info!(user = user.id, pruned, "login succeeded");
    Ok(Session { access, refresh, user })
}

/// Look up a presented token of `kind`, removing it when expired.
fn resolve_token(conn: &Connection, token: &str, kind: TokenKind, now: NaiveDateTime) -> ServiceResult<i64> {
    let digest = hash_token(token);
    let stored = repository::find_token(conn, &digest)?
        .filter(|t| t.kind == kind)
        .ok_or(ServiceError::Unauthenticated)?;
    if stored.expires_at <= now {
        repository::delete_token(conn, &digest)?;
        return Err(ServiceError::TokenExpired);
    }
    Ok(stored.user_id)
}

/// Issue a fresh access token for a valid refresh token.
pub fn refresh_access(
    conn: &Connection,
    refresh_token: &str,
    lifetimes: TokenLifetimes,
    now: NaiveDateTime,
) -> ServiceResult<String> {
    let user_id = resolve_token(conn, refresh_token, TokenKind::Refresh, now)?;
    issue_token(conn, user_id, TokenKind::Access, lifetimes.access, now)
}

/// The user behind a bearer access token.
pub fn authenticate(conn: &Connection, access_token: &str, now: NaiveDateTime) -> ServiceResult<User> {
    let user_id = resolve_token(conn, access_token, TokenKind::Access, now)?;
    repository::get_user(conn, user_id)?.ok_or(ServiceError::Unauthenticated)
}

/// Revoke every token held by `user`.
pub fn logout(conn: &Connection, user: &User) -> ServiceResult<()> {
    let revoked = repository::delete_user_tokens(conn, user.id)?;
    tracing::info!(user = user.id, revoked, "logged out");
    Ok(())
}

// ─── Administration ────────────────────────────────────────────────────────

pub fn get_user(conn: &Connection, id: i64) -> ServiceResult<User> {
    require_user(conn, id)
}

fn require_user(conn: &Connection, id: i64) -> ServiceResult<User> {
    repository::get_user(conn, id)?.ok_or_else(|| ServiceError::NotFound(format!("User {id}")))
}

pub fn list_users(conn: &Connection, role: Option<Role>) -> ServiceResult<Vec<User>> {
    Ok(repository::list_users(conn, &UserFilter { role })?)
}

/// Delete an account. Its patient row (if any) and nurse tasks go with it;
/// clinical references to it are cleared.
pub fn delete_user(conn: &Connection, actor: &User, id: i64) -> ServiceResult<()> {
    ensure_allowed(actor.role, Action::DeleteUser)?;
    repository::delete_user(conn, id)?;
    tracing::info!(user = id, actor = actor.id, "user deleted");
    Ok(())
}

/// Create the configured administrator unless the username is taken.
/// Returns true when an account was created.
pub fn ensure_bootstrap_admin(conn: &Connection, admin: &BootstrapAdmin, now: NaiveDateTime) -> ServiceResult<bool> {
    if repository::username_exists(conn, &admin.username)? {
        return Ok(false);
    }
    let problems = password_problems(&admin.password, &admin.username);
    if !problems.is_empty() {
        tracing::warn!(username = %admin.username, ?problems, "bootstrap admin password is weak");
    }
    let id = repository::insert_user(
        conn,
        &NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash: hash_password(&admin.password),
            role: Role::Admin,
            first_name: String::new(),
            last_name: String::new(),
            phone: String::new(),
        },
        now,
    )?;
    tracing::info!(user = id, username = %admin.username, "bootstrap administrator created");
    Ok(true)
}
