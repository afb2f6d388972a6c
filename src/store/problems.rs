// SPDX-License-Identifier: MPL-2.0

use crate::api::Problem;
use crate::store::{Db, StoreError};
use rusqlite::{OptionalExtension, params};

/// Catalog operations
pub struct ProblemRepo<'a> {
    db: &'a Db,
}

impl<'a> ProblemRepo<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Upsert catalog entries keyed by number. Ids of existing problems are
    /// kept so status and favorite rows stay attached.
    pub fn import(&self, problems: &[Problem]) -> Result<usize, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        for problem in problems {
            tx.execute(
                r#"
                INSERT INTO problems (number, title, difficulty, phase, url)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(number) DO UPDATE SET
                    title = excluded.title,
                    difficulty = excluded.difficulty,
                    phase = excluded.phase,
                    url = excluded.url
                "#,
                params![
                    problem.number,
                    problem.title,
                    problem.difficulty,
                    problem.phase,
                    problem.url,
                ],
            )?;
        }

        tx.commit()?;
        Ok(problems.len())
    }

    pub fn find_by_number(&self, number: i64) -> Result<Option<Problem>, StoreError> {
        let conn = self.db.conn();
        let problem = conn
            .query_row(
                "SELECT id, number, title, difficulty, phase, url FROM problems WHERE number = ?",
                [number],
                Self::row_to_problem,
            )
            .optional()?;
        Ok(problem)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Problem>, StoreError> {
        let conn = self.db.conn();
        let problem = conn
            .query_row(
                "SELECT id, number, title, difficulty, phase, url FROM problems WHERE id = ?",
                [id],
                Self::row_to_problem,
            )
            .optional()?;
        Ok(problem)
    }

    /// Whole catalog, grouped by phase then number
    pub fn list(&self) -> Result<Vec<Problem>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, number, title, difficulty, phase, url
            FROM problems
            ORDER BY phase IS NULL, phase, number
            "#,
        )?;
        let problems = stmt
            .query_map([], Self::row_to_problem)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(problems)
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.db.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM problems", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_problem(row: &rusqlite::Row) -> Result<Problem, rusqlite::Error> {
        Ok(Problem {
            id: row.get(0)?,
            number: row.get(1)?,
            title: row.get(2)?,
            difficulty: row.get(3)?,
            phase: row.get(4)?,
            url: row.get(5)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn problem(number: i64, title: &str) -> Problem {
        Problem {
            id: 0,
            number,
            title: title.to_string(),
            difficulty: Some("medium".to_string()),
            phase: Some("arrays".to_string()),
            url: None,
        }
    }

    /// In-memory database with problems 1, 2 and 42
    pub(crate) fn seeded_db() -> Db {
        let db = Db::open_in_memory().unwrap();
        ProblemRepo::new(&db)
            .import(&[
                problem(1, "Two Sum"),
                problem(2, "Add Two Numbers"),
                problem(42, "Trapping Rain Water"),
            ])
            .unwrap();
        db
    }

    #[test]
    fn test_import_and_lookup() {
        let db = seeded_db();
        let repo = ProblemRepo::new(&db);

        assert_eq!(repo.count().unwrap(), 3);
        let found = repo.find_by_number(42).unwrap().unwrap();
        assert_eq!(found.title, "Trapping Rain Water");
        assert_eq!(repo.find_by_id(found.id).unwrap().unwrap().number, 42);
        assert!(repo.find_by_number(7).unwrap().is_none());
    }

    #[test]
    fn test_reimport_keeps_ids() {
        let db = seeded_db();
        let repo = ProblemRepo::new(&db);
        let before = repo.find_by_number(42).unwrap().unwrap();

        let mut renamed = problem(42, "Trapping Rain Water II");
        renamed.phase = None;
        repo.import(&[renamed]).unwrap();

        let after = repo.find_by_number(42).unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.title, "Trapping Rain Water II");
        assert_eq!(repo.count().unwrap(), 3);
    }

    #[test]
    fn test_list_puts_unphased_last() {
        let db = seeded_db();
        let repo = ProblemRepo::new(&db);
        let mut loose = problem(3, "Longest Substring");
        loose.phase = None;
        repo.import(&[loose]).unwrap();

        let numbers: Vec<i64> = repo.list().unwrap().iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 42, 3]);
    }
}
