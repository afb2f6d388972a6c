// SPDX-License-Identifier: MPL-2.0

use crate::store::{Db, StoreError};
use rusqlite::{OptionalExtension, params};

/// Opaque bearer tokens. Stands in for the identity provider: a token maps to
/// a user id and nothing else.
pub struct TokenRepo<'a> {
    db: &'a Db,
}

impl<'a> TokenRepo<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub fn issue(&self, user_id: &str) -> Result<String, StoreError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO api_tokens (token, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, Db::now()],
        )?;
        Ok(token)
    }

    pub fn resolve(&self, token: &str) -> Result<Option<String>, StoreError> {
        let conn = self.db.conn();
        let user = conn
            .query_row(
                "SELECT user_id FROM api_tokens WHERE token = ?",
                [token],
                |row| row.get(0),
            )
            .optional()?;
        Ok(user)
    }

    pub fn revoke_all(&self, user_id: &str) -> Result<usize, StoreError> {
        let conn = self.db.conn();
        Ok(conn.execute("DELETE FROM api_tokens WHERE user_id = ?", [user_id])?)
    }
}
