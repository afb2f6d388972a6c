// SPDX-License-Identifier: MPL-2.0

use crate::api::{ProblemStatus, StatusUpdate, UnknownStatus};
use crate::server::ApiError;
use crate::store::{Db, ProblemRepo, StatusRepo};
use tracing::{debug, info};

/// Authoritative status transitions for one user and one problem
pub struct StatusWriter<'a> {
    db: &'a Db,
}

impl<'a> StatusWriter<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Validate, resolve the public problem number, then commit the status
    /// row and its history entry together. Same-state requests succeed
    /// without writing.
    pub fn update_status(
        &self,
        user_id: &str,
        problem_number: i64,
        raw_status: &str,
    ) -> Result<StatusUpdate, ApiError> {
        let status: ProblemStatus = raw_status
            .parse()
            .map_err(|e: UnknownStatus| ApiError::BadRequest(e.to_string()))?;

        let problem = ProblemRepo::new(self.db)
            .find_by_number(problem_number)?
            .ok_or_else(|| ApiError::NotFound(format!("problem {problem_number} not found")))?;

        let change =
            StatusRepo::new(self.db).update_status_with_history(user_id, problem.id, status)?;

        if change.recorded {
            info!(
                user = user_id,
                problem = problem_number,
                from = %change.previous,
                to = %change.current,
                "status changed"
            );
        } else {
            debug!(
                user = user_id,
                problem = problem_number,
                status = %status,
                "status unchanged"
            );
        }

        Ok(StatusUpdate {
            problem_number,
            status: change.current,
            previous_status: change.previous,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ErrorKind, StatusEntry};
    use crate::store::HistoryRepo;
    use crate::store::problems::tests::seeded_db;

    const USER: &str = "u";

    fn history_len(db: &Db) -> usize {
        HistoryRepo::new(db).recent(USER, 500, 0).unwrap().entries.len()
    }

    fn statuses(db: &Db) -> Vec<StatusEntry> {
        StatusRepo::new(db).list(USER).unwrap()
    }

    #[test]
    fn test_scenarios_a_b_c() {
        let db = seeded_db();
        let writer = StatusWriter::new(&db);

        // A: first touch creates the row and a null-from history entry
        let a = writer.update_status(USER, 42, "attempting").unwrap();
        assert_eq!(a.previous_status, ProblemStatus::Untouched);
        assert_eq!(a.status, ProblemStatus::Attempting);
        assert_eq!(statuses(&db)[0].status, ProblemStatus::Attempting);
        let history = HistoryRepo::new(&db).recent(USER, 10, 0).unwrap().entries;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_status, None);
        assert_eq!(history[0].to_status, ProblemStatus::Attempting);

        // B: same state again is a no-op
        let rows_before = statuses(&db);
        let b = writer.update_status(USER, 42, "attempting").unwrap();
        assert_eq!(b.previous_status, ProblemStatus::Attempting);
        assert_eq!(b.status, ProblemStatus::Attempting);
        assert_eq!(history_len(&db), 1);
        assert_eq!(statuses(&db), rows_before);

        // C: a real transition appends a second entry
        let c = writer.update_status(USER, 42, "solved").unwrap();
        assert_eq!(c.previous_status, ProblemStatus::Attempting);
        assert_eq!(statuses(&db)[0].status, ProblemStatus::Solved);
        let history = HistoryRepo::new(&db).recent(USER, 10, 0).unwrap().entries;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from_status, Some(ProblemStatus::Attempting));
        assert_eq!(history[0].to_status, ProblemStatus::Solved);
    }

    #[test]
    fn test_invalid_status_is_bad_request() {
        let db = seeded_db();
        let err = StatusWriter::new(&db)
            .update_status(USER, 42, "finished")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(history_len(&db), 0);
    }

    #[test]
    fn test_unknown_problem_is_not_found() {
        let db = seeded_db();
        let err = StatusWriter::new(&db)
            .update_status(USER, 9_999, "solved")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(statuses(&db).is_empty());
    }

    #[test]
    fn test_every_state_reaches_every_other_state() {
        let db = seeded_db();
        let writer = StatusWriter::new(&db);
        let mut expected_history = 0;
        let mut current = ProblemStatus::Untouched;

        for from in ProblemStatus::ALL {
            for to in ProblemStatus::ALL {
                if current != from {
                    writer.update_status(USER, 1, from.as_str()).unwrap();
                    expected_history += 1;
                    current = from;
                }
                let update = writer.update_status(USER, 1, to.as_str()).unwrap();
                assert_eq!(update.previous_status, from);
                assert_eq!(update.status, to);
                if from != to {
                    expected_history += 1;
                }
                current = to;
            }
        }

        assert_eq!(history_len(&db), expected_history);
    }

    #[test]
    fn test_concurrent_writers_keep_history_chain_intact() {
        let db = seeded_db();

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let db = db.clone();
                std::thread::spawn(move || {
                    let writer = StatusWriter::new(&db);
                    for i in 0..50 {
                        let status = ProblemStatus::ALL[(worker + i) % ProblemStatus::ALL.len()];
                        writer.update_status(USER, 42, status.as_str()).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let mut history = HistoryRepo::new(&db).recent(USER, 500, 0).unwrap().entries;
        history.reverse();
        assert!(!history.is_empty());
        assert_eq!(history[0].from_status, None);
        for pair in history.windows(2) {
            assert_eq!(pair[1].from_status.unwrap_or_default(), pair[0].to_status);
            assert_ne!(pair[1].from_status.unwrap_or_default(), pair[1].to_status);
        }

        let last = history.last().unwrap().to_status;
        let id_42 = ProblemRepo::new(&db).find_by_number(42).unwrap().unwrap().id;
        assert_eq!(StatusRepo::new(&db).get(USER, id_42).unwrap(), last);
    }
}
