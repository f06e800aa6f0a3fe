use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::query::{fmt_datetime, parse_col};
use crate::db::DatabaseError;
use crate::models::TokenKind;

/// A stored bearer token, identified by the hash of its secret.
#[derive(Debug, Clone)]
pub struct StoredToken {
    pub user_id: i64,
    pub kind: TokenKind,
    pub expires_at: NaiveDateTime,
}

pub fn insert_token(
    conn: &Connection,
    token_hash: &str,
    user_id: i64,
    kind: TokenKind,
    created_at: NaiveDateTime,
    expires_at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO auth_tokens (token_hash, user_id, kind, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            token_hash,
            user_id,
            kind.as_str(),
            fmt_datetime(&created_at),
            fmt_datetime(&expires_at),
        ],
    )?;
    Ok(())
}

pub fn find_token(conn: &Connection, token_hash: &str) -> Result<Option<StoredToken>, DatabaseError> {
    let token = conn
        .query_row(
            "SELECT user_id, kind, expires_at FROM auth_tokens WHERE token_hash = ?1",
            params![token_hash],
            |row| {
                Ok(StoredToken {
                    user_id: row.get(0)?,
                    kind: parse_col(row, 1)?,
                    expires_at: parse_col(row, 2)?,
                })
            },
        )
        .optional()?;
    Ok(token)
}

/// Returns true when a row was removed.
pub fn delete_token(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM auth_tokens WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(deleted > 0)
}

pub fn delete_user_tokens(conn: &Connection, user_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM auth_tokens WHERE user_id = ?1",
        params![user_id],
    )?;
    Ok(deleted)
}

pub fn prune_expired_tokens(conn: &Connection, now: NaiveDateTime) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM auth_tokens WHERE expires_at <= ?1",
        params![fmt_datetime(&now)],
    )?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_user;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{NewUser, Role};
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn setup() -> (Connection, i64) {
        let conn = open_memory_database().unwrap();
        let user_id = insert_user(
            &conn,
            &NewUser {
                username: "token-owner".into(),
                email: "owner@hms.test".into(),
                password_hash: "x".into(),
                role: Role::Doctor,
                first_name: String::new(),
                last_name: String::new(),
                phone: String::new(),
            },
            now(),
        )
        .unwrap();
        (conn, user_id)
    }

    #[test]
    fn stored_token_is_found_by_hash() {
        let (conn, user_id) = setup();
        insert_token(&conn, "h1", user_id, TokenKind::Access, now(), now() + Duration::hours(1)).unwrap();

        let token = find_token(&conn, "h1").unwrap().unwrap();
        assert_eq!(token.user_id, user_id);
        assert_eq!(token.kind, TokenKind::Access);
        assert_eq!(token.expires_at, now() + Duration::hours(1));
        assert!(find_token(&conn, "other").unwrap().is_none());
    }

    #[test]
    fn prune_removes_only_expired() {
        let (conn, user_id) = setup();
        insert_token(&conn, "old", user_id, TokenKind::Access, now(), now() - Duration::minutes(1)).unwrap();
        insert_token(&conn, "new", user_id, TokenKind::Refresh, now(), now() + Duration::days(1)).unwrap();

        assert_eq!(prune_expired_tokens(&conn, now()).unwrap(), 1);
        assert!(find_token(&conn, "old").unwrap().is_none());
        assert!(find_token(&conn, "new").unwrap().is_some());
    }

    #[test]
    fn tokens_vanish_with_their_user() {
        let (conn, user_id) = setup();
        insert_token(&conn, "h", user_id, TokenKind::Access, now(), now() + Duration::hours(1)).unwrap();
        crate::db::repository::delete_user(&conn, user_id).unwrap();
        assert!(find_token(&conn, "h").unwrap().is_none());
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let (conn, user_id) = setup();
        insert_token(&conn, "h", user_id, TokenKind::Refresh, now(), now() + Duration::hours(1)).unwrap();
        assert!(delete_token(&conn, "h").unwrap());
        assert!(!delete_token(&conn, "h").unwrap());
        assert_eq!(delete_user_tokens(&conn, user_id).unwrap(), 0);
    }
}
