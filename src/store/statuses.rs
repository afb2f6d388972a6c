// SPDX-License-Identifier: MPL-2.0

use crate::api::{ProblemStatus, StatusEntry};
use crate::store::db::{to_datetime, to_status};
use crate::store::{Db, StoreError};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use std::collections::HashMap;

/// Outcome of a status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: ProblemStatus,
    pub current: ProblemStatus,
    /// False when the write was a same-state no-op
    pub recorded: bool,
}

/// Per-user status rows and the history that goes with them
pub struct StatusRepo<'a> {
    db: &'a Db,
}

impl<'a> StatusRepo<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Stored status, or untouched when there is no row
    #[allow(dead_code)]
    pub fn get(&self, user_id: &str, problem_id: i64) -> Result<ProblemStatus, StoreError> {
        let conn = self.db.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT status FROM problem_status WHERE user_id = ?1 AND problem_id = ?2",
                params![user_id, problem_id],
                |row| row.get(0),
            )
            .optional()?;
        raw.as_deref()
            .map(to_status)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    /// All stored rows for a user, keyed by public problem number
    pub fn list(&self, user_id: &str) -> Result<Vec<StatusEntry>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT p.number, s.status, s.updated_at
            FROM problem_status s
            JOIN problems p ON p.id = s.problem_id
            WHERE s.user_id = ?
            ORDER BY p.number
            "#,
        )?;

        let mut rows = stmt.query([user_id])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let raw: String = row.get(1)?;
            entries.push(StatusEntry {
                problem_number: row.get(0)?,
                status: to_status(&raw)?,
                updated_at: to_datetime(row.get(2)?),
            });
        }
        Ok(entries)
    }

    /// Move (user, problem) to `status` and append the matching history row.
    ///
    /// The read of the current row, the row write and the history insert run
    /// in one immediate transaction: either both writes land or neither does.
    /// A same-state request writes nothing. Moving to untouched deletes the
    /// row.
    pub fn update_status_with_history(
        &self,
        user_id: &str,
        problem_id: i64,
        status: ProblemStatus,
    ) -> Result<StatusChange, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored: Option<String> = tx
            .query_row(
                "SELECT status FROM problem_status WHERE user_id = ?1 AND problem_id = ?2",
                params![user_id, problem_id],
                |row| row.get(0),
            )
            .optional()?;
        let stored = stored.as_deref().map(to_status).transpose()?;
        let previous = stored.unwrap_or_default();

        if previous == status {
            return Ok(StatusChange {
                previous,
                current: status,
                recorded: false,
            });
        }

        let now = Db::now();
        if status.is_untouched() {
            tx.execute(
                "DELETE FROM problem_status WHERE user_id = ?1 AND problem_id = ?2",
                params![user_id, problem_id],
            )?;
        } else {
            tx.execute(
                r#"
                INSERT INTO problem_status (user_id, problem_id, status, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id, problem_id) DO UPDATE SET
                    status = excluded.status,
                    updated_at = excluded.updated_at
                "#,
                params![user_id, problem_id, status.as_str(), now],
            )?;
        }

        tx.execute(
            r#"
            INSERT INTO status_history (user_id, problem_id, from_status, to_status, changed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                user_id,
                problem_id,
                stored.map(ProblemStatus::as_str),
                status.as_str(),
                now
            ],
        )?;

        tx.commit()?;

        Ok(StatusChange {
            previous,
            current: status,
            recorded: true,
        })
    }

    /// Number of stored rows per status. Untouched is never stored, so it is
    /// never a key.
    pub fn counts(&self, user_id: &str) -> Result<HashMap<ProblemStatus, i64>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM problem_status WHERE user_id = ? GROUP BY status",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut counts = HashMap::new();
        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            counts.insert(to_status(&raw)?, row.get(1)?);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProblemRepo;
    use crate::store::problems::tests::seeded_db;

    const USER: &str = "user-1";

    fn problem_id(db: &Db, number: i64) -> i64 {
        ProblemRepo::new(db).find_by_number(number).unwrap().unwrap().id
    }

    fn history(db: &Db, user_id: &str) -> Vec<(Option<String>, String)> {
        let conn = db.conn();
        let mut stmt = conn
            .prepare("SELECT from_status, to_status FROM status_history WHERE user_id = ? ORDER BY id")
            .unwrap();
        stmt.query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn status_rows(db: &Db) -> i64 {
        db.conn()
            .query_row("SELECT COUNT(*) FROM problem_status", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_missing_row_reads_untouched() {
        let db = seeded_db();
        let id = problem_id(&db, 42);
        assert_eq!(
            StatusRepo::new(&db).get(USER, id).unwrap(),
            ProblemStatus::Untouched
        );
    }

    #[test]
    fn test_first_transition_creates_row_and_null_history() {
        let db = seeded_db();
        let id = problem_id(&db, 42);
        let repo = StatusRepo::new(&db);

        let change = repo
            .update_status_with_history(USER, id, ProblemStatus::Attempting)
            .unwrap();

        assert_eq!(change.previous, ProblemStatus::Untouched);
        assert_eq!(change.current, ProblemStatus::Attempting);
        assert!(change.recorded);
        assert_eq!(repo.get(USER, id).unwrap(), ProblemStatus::Attempting);
        assert_eq!(history(&db, USER), vec![(None, "attempting".to_string())]);
    }

    #[test]
    fn test_same_status_is_a_no_op() {
        let db = seeded_db();
        let id = problem_id(&db, 42);
        let repo = StatusRepo::new(&db);
        repo.update_status_with_history(USER, id, ProblemStatus::Attempting)
            .unwrap();
        let updated_before: i64 = db
            .conn()
            .query_row("SELECT updated_at FROM problem_status", [], |row| row.get(0))
            .unwrap();

        let change = repo
            .update_status_with_history(USER, id, ProblemStatus::Attempting)
            .unwrap();

        assert_eq!(change.previous, ProblemStatus::Attempting);
        assert!(!change.recorded);
        assert_eq!(history(&db, USER).len(), 1);
        let updated_after: i64 = db
            .conn()
            .query_row("SELECT updated_at FROM problem_status", [], |row| row.get(0))
            .unwrap();
        assert_eq!(updated_before, updated_after);
    }

    #[test]
    fn test_untouched_to_untouched_writes_nothing() {
        let db = seeded_db();
        let id = problem_id(&db, 1);
        let change = StatusRepo::new(&db)
            .update_status_with_history(USER, id, ProblemStatus::Untouched)
            .unwrap();
        assert!(!change.recorded);
        assert_eq!(status_rows(&db), 0);
        assert!(history(&db, USER).is_empty());
    }

    #[test]
    fn test_transition_chain_records_from_and_to() {
        let db = seeded_db();
        let id = problem_id(&db, 42);
        let repo = StatusRepo::new(&db);

        repo.update_status_with_history(USER, id, ProblemStatus::Attempting)
            .unwrap();
        repo.update_status_with_history(USER, id, ProblemStatus::Attempting)
            .unwrap();
        let change = repo
            .update_status_with_history(USER, id, ProblemStatus::Solved)
            .unwrap();

        assert_eq!(change.previous, ProblemStatus::Attempting);
        assert_eq!(repo.get(USER, id).unwrap(), ProblemStatus::Solved);
        assert_eq!(
            history(&db, USER),
            vec![
                (None, "attempting".to_string()),
                (Some("attempting".to_string()), "solved".to_string()),
            ]
        );
    }

    #[test]
    fn test_back_to_untouched_deletes_row_and_records_history() {
        let db = seeded_db();
        let id = problem_id(&db, 2);
        let repo = StatusRepo::new(&db);

        repo.update_status_with_history(USER, id, ProblemStatus::Solved)
            .unwrap();
        let change = repo
            .update_status_with_history(USER, id, ProblemStatus::Untouched)
            .unwrap();

        assert_eq!(change.previous, ProblemStatus::Solved);
        assert_eq!(status_rows(&db), 0);
        assert_eq!(
            history(&db, USER).last().unwrap(),
            &(Some("solved".to_string()), "untouched".to_string())
        );

        // Leaving untouched again starts from a null `from`
        repo.update_status_with_history(USER, id, ProblemStatus::Revisit)
            .unwrap();
        assert_eq!(
            history(&db, USER).last().unwrap(),
            &(None, "revisit".to_string())
        );
    }

    #[test]
    fn test_failed_history_insert_rolls_back_status_write() {
        let db = seeded_db();
        let id = problem_id(&db, 42);
        let repo = StatusRepo::new(&db);
        repo.update_status_with_history(USER, id, ProblemStatus::Attempting)
            .unwrap();

        db.conn()
            .execute_batch(
                r#"
                CREATE TRIGGER fail_history BEFORE INSERT ON status_history
                BEGIN
                    SELECT RAISE(ABORT, 'history unavailable');
                END;
                "#,
            )
            .unwrap();

        let result = repo.update_status_with_history(USER, id, ProblemStatus::Solved);
        assert!(matches!(result, Err(StoreError::Database(_))));
        assert_eq!(repo.get(USER, id).unwrap(), ProblemStatus::Attempting);
        assert_eq!(history(&db, USER).len(), 1);
    }

    #[test]
    fn test_history_rows_cannot_be_rewritten() {
        let db = seeded_db();
        let id = problem_id(&db, 42);
        StatusRepo::new(&db)
            .update_status_with_history(USER, id, ProblemStatus::Solved)
            .unwrap();

        let conn = db.conn();
        assert!(
            conn.execute("UPDATE status_history SET to_status = 'skipped'", [])
                .is_err()
        );
        assert!(conn.execute("DELETE FROM status_history", []).is_err());
        drop(conn);
        assert_eq!(history(&db, USER), vec![(None, "solved".to_string())]);
    }

    #[test]
    fn test_users_are_isolated() {
        let db = seeded_db();
        let id = problem_id(&db, 42);
        let repo = StatusRepo::new(&db);

        repo.update_status_with_history(USER, id, ProblemStatus::Solved)
            .unwrap();

        assert_eq!(repo.get("user-2", id).unwrap(), ProblemStatus::Untouched);
        assert!(repo.list("user-2").unwrap().is_empty());
        assert!(history(&db, "user-2").is_empty());
    }

    #[test]
    fn test_list_and_counts() {
        let db = seeded_db();
        let repo = StatusRepo::new(&db);
        repo.update_status_with_history(USER, problem_id(&db, 1), ProblemStatus::Solved)
            .unwrap();
        repo.update_status_with_history(USER, problem_id(&db, 2), ProblemStatus::Solved)
            .unwrap();
        repo.update_status_with_history(USER, problem_id(&db, 42), ProblemStatus::Skipped)
            .unwrap();

        let listed: Vec<(i64, ProblemStatus)> = repo
            .list(USER)
            .unwrap()
            .into_iter()
            .map(|e| (e.problem_number, e.status))
            .collect();
        assert_eq!(
            listed,
            vec![
                (1, ProblemStatus::Solved),
                (2, ProblemStatus::Solved),
                (42, ProblemStatus::Skipped),
            ]
        );

        let counts = repo.counts(USER).unwrap();
        assert_eq!(counts.get(&ProblemStatus::Solved), Some(&2));
        assert_eq!(counts.get(&ProblemStatus::Skipped), Some(&1));
        assert_eq!(counts.get(&ProblemStatus::Untouched), None);
    }
}
