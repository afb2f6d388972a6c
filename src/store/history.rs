// SPDX-License-Identifier: MPL-2.0

use crate::api::{HistoryEntry, HistoryPage};
use crate::config::HISTORY_WINDOW;
use crate::store::db::{to_datetime, to_status};
use crate::store::{Db, StoreError};
use rusqlite::params;

/// Read side of the status audit trail. Writes only happen through
/// `StatusRepo::update_status_with_history`.
pub struct HistoryRepo<'a> {
    db: &'a Db,
}

impl<'a> HistoryRepo<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Newest-first page of the user's history. Only the most recent
    /// `HISTORY_WINDOW` entries are reachable; anything past that reads as
    /// an empty page.
    pub fn recent(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryPage, StoreError> {
        let limit = limit.min(HISTORY_WINDOW);
        let available = HISTORY_WINDOW.saturating_sub(offset);
        let take = limit.min(available);
        if take == 0 {
            return Ok(HistoryPage {
                entries: Vec::new(),
                offset,
                limit,
                has_more: false,
            });
        }

        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT h.id, h.problem_id, p.number, p.title, p.difficulty,
                   h.from_status, h.to_status, h.changed_at
            FROM status_history h
            JOIN problems p ON p.id = h.problem_id
            WHERE h.user_id = ?1
            ORDER BY h.changed_at DESC, h.id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )?;

        // One extra row tells us whether another page exists
        let mut rows = stmt.query(params![user_id, (take + 1) as i64, offset as i64])?;
        let mut entries = Vec::with_capacity(take);
        while let Some(row) = rows.next()? {
            let from: Option<String> = row.get(5)?;
            let to: String = row.get(6)?;
            entries.push(HistoryEntry {
                id: row.get(0)?,
                problem_id: row.get(1)?,
                problem_number: row.get(2)?,
                problem_title: row.get(3)?,
                difficulty: row.get(4)?,
                from_status: from.as_deref().map(to_status).transpose()?,
                to_status: to_status(&to)?,
                changed_at: to_datetime(row.get(7)?),
            });
        }

        let has_more = entries.len() > take && offset + take < HISTORY_WINDOW;
        entries.truncate(take);

        Ok(HistoryPage {
            entries,
            offset,
            limit,
            has_more,
        })
    }
}
