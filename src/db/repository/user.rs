use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::query::{fmt_datetime, parse_col, SqlFilter};
use crate::db::DatabaseError;
use crate::models::{NewUser, Role, User, UserFilter};

const USER_COLUMNS: &str =
    "id, username, email, role, phone, profile_picture, first_name, last_name, date_joined";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role: parse_col(row, 3)?,
        phone: row.get(4)?,
        profile_picture: row.get(5)?,
        first_name: row.get(6)?,
        last_name: row.get(7)?,
        date_joined: parse_col(row, 8)?,
    })
}

pub fn insert_user(
    conn: &Connection,
    user: &NewUser,
    date_joined: NaiveDateTime,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO users (username, email, password_hash, role, first_name, last_name, phone, date_joined)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.username,
            user.email,
            user.password_hash,
            user.role.as_str(),
            user.first_name,
            user.last_name,
            user.phone,
            fmt_datetime(&date_joined),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>, DatabaseError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            map_user,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, DatabaseError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            map_user,
        )
        .optional()?;
    Ok(user)
}

/// The user and stored password hash for a login attempt.
pub fn get_credentials(
    conn: &Connection,
    username: &str,
) -> Result<Option<(User, String)>, DatabaseError> {
    let found = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = ?1"),
            params![username],
            |row| Ok((map_user(row)?, row.get::<_, String>(9)?)),
        )
        .optional()?;
    Ok(found)
}

pub fn username_exists(conn: &Connection, username: &str) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        params![username],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn list_users(conn: &Connection, filter: &UserFilter) -> Result<Vec<User>, DatabaseError> {
    let mut sql = SqlFilter::new();
    sql.eq_opt("role", filter.role.map(|r| r.as_str()));

    let query = format!(
        "SELECT {USER_COLUMNS} FROM users{} ORDER BY id",
        sql.where_sql()
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(sql.params().as_slice(), map_user)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub fn count_users_with_role(conn: &Connection, role: Role) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1",
        params![role.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Removes the user; dependent rows cascade or are nulled by the schema.
pub fn delete_user(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("User", id));
    }
    Ok(())
}
