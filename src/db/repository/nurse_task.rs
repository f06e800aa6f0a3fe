use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::query::{fmt_datetime, fmt_time, parse_col, SqlFilter};
use crate::db::DatabaseError;
use crate::models::{display_name, full_name, NurseTask, NurseTaskDraft, NurseTaskFilter, NurseTaskView};

const TASK_SELECT: &str = "SELECT t.id, t.nurse_id, t.patient_id, t.title, t.scheduled_time, \
     t.completed, t.created_at, n.first_name, n.last_name, p.first_name, p.last_name \
     FROM nurse_tasks t \
     JOIN users n ON n.id = t.nurse_id \
     JOIN patients p ON p.id = t.patient_id";

const TASK_SEARCH: &[&str] = &["t.title", "p.first_name", "p.last_name"];

fn map_task_view(row: &Row<'_>) -> rusqlite::Result<NurseTaskView> {
    Ok(NurseTaskView {
        task: NurseTask {
            id: row.get(0)?,
            nurse_id: row.get(1)?,
            patient_id: row.get(2)?,
            title: row.get(3)?,
            scheduled_time: parse_col(row, 4)?,
            completed: row.get(5)?,
            created_at: parse_col(row, 6)?,
        },
        nurse_name: display_name(&row.get::<_, String>(7)?, &row.get::<_, String>(8)?),
        patient_name: full_name(&row.get::<_, String>(9)?, &row.get::<_, String>(10)?),
    })
}

pub fn insert_nurse_task(
    conn: &Connection,
    draft: &NurseTaskDraft,
    now: NaiveDateTime,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO nurse_tasks (nurse_id, patient_id, title, scheduled_time, completed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            draft.nurse_id,
            draft.patient_id,
            draft.title,
            fmt_time(&draft.scheduled_time),
            draft.completed,
            fmt_datetime(&now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_nurse_task(conn: &Connection, id: i64) -> Result<Option<NurseTaskView>, DatabaseError> {
    let view = conn
        .query_row(
            &format!("{TASK_SELECT} WHERE t.id = ?1"),
            params![id],
            map_task_view,
        )
        .optional()?;
    Ok(view)
}

pub fn list_nurse_tasks(
    conn: &Connection,
    filter: &NurseTaskFilter,
) -> Result<Vec<NurseTaskView>, DatabaseError> {
    let mut sql = SqlFilter::new();
    sql.eq_opt("t.nurse_id", filter.nurse_id);
    sql.eq_opt("t.patient_id", filter.patient_id);
    sql.eq_opt("t.completed", filter.completed);
    sql.search(TASK_SEARCH, filter.search.as_deref());

    let query = format!(
        "{TASK_SELECT}{} ORDER BY t.scheduled_time ASC, t.id ASC",
        sql.where_sql()
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(sql.params().as_slice(), map_task_view)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub fn update_nurse_task(conn: &Connection, id: i64, draft: &NurseTaskDraft) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE nurse_tasks SET nurse_id = ?2, patient_id = ?3, title = ?4, scheduled_time = ?5,
            completed = ?6
         WHERE id = ?1",
        params![
            id,
            draft.nurse_id,
            draft.patient_id,
            draft.title,
            fmt_time(&draft.scheduled_time),
            draft.completed,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("NurseTask", id));
    }
    Ok(())
}

pub fn delete_nurse_task(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM nurse_tasks WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("NurseTask", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{delete_patient, delete_user};
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;
    use crate::test_support::{fixed_now, seed_patient, seed_user, time};

    fn task(nurse_id: i64, patient_id: i64, title: &str, h: u32) -> NurseTaskDraft {
        NurseTaskDraft {
            nurse_id,
            patient_id,
            title: title.into(),
            scheduled_time: time(h, 0),
            completed: false,
        }
    }

    #[test]
    fn list_orders_by_scheduled_time_and_filters_nurse() {
        let conn = open_memory_database().unwrap();
        let nina = seed_user(&conn, "nina", Role::Nurse);
        let olga = seed_user(&conn, "olga", Role::Nurse);
        let patient = seed_patient(&conn, "p@hms.test");
        insert_nurse_task(&conn, &task(nina, patient.id, "Evening meds", 18), fixed_now()).unwrap();
        insert_nurse_task(&conn, &task(nina, patient.id, "Morning vitals", 8), fixed_now()).unwrap();
        insert_nurse_task(&conn, &task(olga, patient.id, "Dressing", 10), fixed_now()).unwrap();

        let mine = list_nurse_tasks(
            &conn,
            &NurseTaskFilter {
                nurse_id: Some(nina),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].task.title, "Morning vitals");
        assert!(mine.iter().all(|t| t.task.nurse_id == nina));
        assert_eq!(mine[0].nurse_name, "nina Test");
        assert_eq!(mine[0].patient_name, "Jane Doe");
    }

    #[test]
    fn search_and_completed_filters() {
        let conn = open_memory_database().unwrap();
        let nurse = seed_user(&conn, "nina", Role::Nurse);
        let patient = seed_patient(&conn, "p@hms.test");
        let id = insert_nurse_task(&conn, &task(nurse, patient.id, "Check IV line", 9), fixed_now()).unwrap();
        insert_nurse_task(&conn, &task(nurse, patient.id, "Walk", 11), fixed_now()).unwrap();

        let mut done = task(nurse, patient.id, "Check IV line", 9);
        done.completed = true;
        update_nurse_task(&conn, id, &done).unwrap();

        let completed = list_nurse_tasks(
            &conn,
            &NurseTaskFilter {
                completed: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(completed.len(), 1);

        let found = list_nurse_tasks(
            &conn,
            &NurseTaskFilter {
                search: Some("iv".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].task.id, id);
    }

    #[test]
    fn tasks_follow_nurse_and_patient_deletion() {
        let conn = open_memory_database().unwrap();
        let nurse = seed_user(&conn, "nina", Role::Nurse);
        let p1 = seed_patient(&conn, "p1@hms.test");
        let p2 = seed_patient(&conn, "p2@hms.test");
        let t1 = insert_nurse_task(&conn, &task(nurse, p1.id, "a", 9), fixed_now()).unwrap();
        let t2 = insert_nurse_task(&conn, &task(nurse, p2.id, "b", 9), fixed_now()).unwrap();

        delete_patient(&conn, p1.id).unwrap();
        assert!(get_nurse_task(&conn, t1).unwrap().is_none());
        assert!(get_nurse_task(&conn, t2).unwrap().is_some());

        delete_user(&conn, nurse).unwrap();
        assert!(get_nurse_task(&conn, t2).unwrap().is_none());
    }
}
