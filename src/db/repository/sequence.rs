use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::IdKind;

/// Reserve the next public identifier of `kind`.
///
/// Must run inside the write transaction that inserts the row using the
/// identifier: the counter bump and the insert then commit or roll back
/// together, and SQLite's writer lock serialises concurrent callers.
/// A rolled-back transaction leaves no gap; a deleted row does.
pub fn next_public_id(conn: &Connection, kind: IdKind) -> Result<String, DatabaseError> {
    let value: i64 = conn.query_row(
        "UPDATE id_sequences SET last_value = last_value + 1
         WHERE name = ?1
         RETURNING last_value",
        params![kind.sequence_name()],
        |row| row.get(0),
    )?;
    Ok(kind.format(value.max(0) as u64))
}

/// Last number handed out for `kind` (0 when none yet).
pub fn current_sequence_value(conn: &Connection, kind: IdKind) -> Result<i64, DatabaseError> {
    let value = conn.query_row(
        "SELECT last_value FROM id_sequences WHERE name = ?1",
        params![kind.sequence_name()],
        |row| row.get(0),
    )?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn first_identifiers_start_at_one() {
        let conn = open_memory_database().unwrap();
        assert_eq!(next_public_id(&conn, IdKind::Patient).unwrap(), "PAT-000001");
        assert_eq!(next_public_id(&conn, IdKind::Patient).unwrap(), "PAT-000002");
        assert_eq!(
            next_public_id(&conn, IdKind::Appointment).unwrap(),
            "APT-000001"
        );
    }

    #[test]
    fn families_are_independent() {
        let conn = open_memory_database().unwrap();
        for _ in 0..3 {
            next_public_id(&conn, IdKind::Appointment).unwrap();
        }
        assert_eq!(current_sequence_value(&conn, IdKind::Appointment).unwrap(), 3);
        assert_eq!(current_sequence_value(&conn, IdKind::Patient).unwrap(), 0);
    }

    #[test]
    fn rolled_back_reservation_is_reused() {
        let mut conn = open_memory_database().unwrap();
        {
            let tx = conn.transaction().unwrap();
            assert_eq!(next_public_id(&tx, IdKind::Patient).unwrap(), "PAT-000001");
            tx.rollback().unwrap();
        }
        assert_eq!(next_public_id(&conn, IdKind::Patient).unwrap(), "PAT-000001");
    }
}
