// SPDX-License-Identifier: MPL-2.0

use crate::api::FavoriteEntry;
use crate::store::db::to_datetime;
use crate::store::{Db, StoreError};
use rusqlite::params;

/// Bookmarks. Presence of a row is the whole state; there is no history.
pub struct FavoriteRepo<'a> {
    db: &'a Db,
}

impl<'a> FavoriteRepo<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Returns false if the problem was already a favorite
    pub fn add(&self, user_id: &str, problem_id: i64) -> Result<bool, StoreError> {
        let conn = self.db.conn();
        let inserted = conn.execute(
            r#"
            INSERT INTO favorites (user_id, problem_id, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, problem_id) DO NOTHING
            "#,
            params![user_id, problem_id, Db::now()],
        )?;
        Ok(inserted > 0)
    }

    /// Returns false if there was nothing to remove
    pub fn remove(&self, user_id: &str, problem_id: i64) -> Result<bool, StoreError> {
        let conn = self.db.conn();
        let deleted = conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND problem_id = ?2",
            params![user_id, problem_id],
        )?;
        Ok(deleted > 0)
    }

    #[allow(dead_code)]
    pub fn contains(&self, user_id: &str, problem_id: i64) -> Result<bool, StoreError> {
        let conn = self.db.conn();
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM favorites WHERE user_id = ?1 AND problem_id = ?2)",
            params![user_id, problem_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Newest favorites first
    pub fn list(&self, user_id: &str) -> Result<Vec<FavoriteEntry>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT problem_id, created_at FROM favorites
            WHERE user_id = ?
            ORDER BY created_at DESC, problem_id
            "#,
        )?;
        let entries = stmt
            .query_map([user_id], |row| {
                Ok(FavoriteEntry {
                    problem_id: row.get(0)?,
                    created_at: to_datetime(row.get(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn count(&self, user_id: &str) -> Result<i64, StoreError> {
        let conn = self.db.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM favorites WHERE user_id = ?",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
