// SPDX-License-Identifier: MPL-2.0

use crate::api::{ClientError, FavoriteUpdate, LadderClient, ProblemStatus, StatusUpdate};
use crate::state::SessionSnapshot;
use async_trait::async_trait;

/// The server calls the optimistic store depends on
#[async_trait]
pub trait ProgressApi: Send + Sync {
    async fn set_status(
        &self,
        problem_number: i64,
        status: ProblemStatus,
    ) -> Result<StatusUpdate, ClientError>;

    async fn set_favorite(
        &self,
        problem_id: i64,
        favorited: bool,
    ) -> Result<FavoriteUpdate, ClientError>;

    /// Authoritative state used to seed the mirrors
    async fn fetch_snapshot(&self) -> Result<SessionSnapshot, ClientError>;
}

#[async_trait]
impl ProgressApi for LadderClient {
    async fn set_status(
        &self,
        problem_number: i64,
        status: ProblemStatus,
    ) -> Result<StatusUpdate, ClientError> {
        self.update_status(problem_number, status).await
    }

    async fn set_favorite(
        &self,
        problem_id: i64,
        favorited: bool,
    ) -> Result<FavoriteUpdate, ClientError> {
        if favorited {
            self.add_favorite(problem_id).await
        } else {
            self.remove_favorite(problem_id).await
        }
    }

    async fn fetch_snapshot(&self) -> Result<SessionSnapshot, ClientError> {
        let (statuses, favorites) = tokio::try_join!(self.statuses(), self.favorites())?;
        Ok(SessionSnapshot {
            statuses: statuses
                .into_iter()
                .filter(|entry| !entry.status.is_untouched())
                .map(|entry| (entry.problem_number, entry.status))
                .collect(),
            favorites: favorites.into_iter().map(|f| f.problem_id).collect(),
        })
    }
}
