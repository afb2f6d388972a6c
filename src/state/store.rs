// SPDX-License-Identifier: MPL-2.0

//! Optimistic client mirror of per-problem status and favorites.
//!
//! Every write lands in the local mirror before its request is sent, so reads
//! see it immediately. When the request settles the write is either kept or
//! rolled back to the value captured when that call started. Overlapping calls
//! for the same key are not serialized: each one restores its own captured
//! value on failure, so the last call to settle decides what remains.

use crate::api::{ClientError, FavoriteUpdate, ProblemStatus, StatusUpdate};
use crate::runtime;
use crate::state::{ProgressApi, SessionSnapshot, SnapshotStorage};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub fn status_tag(problem_number: i64) -> String {
    format!("status-{problem_number}")
}

pub fn favorite_tag(problem_id: i64) -> String {
    format!("favorite-{problem_id}")
}

#[derive(Default)]
struct Mirror {
    statuses: BTreeMap<i64, ProblemStatus>,
    favorites: BTreeSet<i64>,
    /// tag -> number of requests still in flight
    pending: HashMap<String, usize>,
    initialized: bool,
}

impl Mirror {
    fn status(&self, problem_number: i64) -> ProblemStatus {
        self.statuses
            .get(&problem_number)
            .copied()
            .unwrap_or_default()
    }

    fn put_status(&mut self, problem_number: i64, status: ProblemStatus) {
        if status.is_untouched() {
            self.statuses.remove(&problem_number);
        } else {
            self.statuses.insert(problem_number, status);
        }
    }

    fn put_favorite(&mut self, problem_id: i64, favorited: bool) {
        if favorited {
            self.favorites.insert(problem_id);
        } else {
            self.favorites.remove(&problem_id);
        }
    }

    fn begin(&mut self, tag: &str) {
        *self.pending.entry(tag.to_string()).or_default() += 1;
    }

    fn settle(&mut self, tag: &str) {
        if let Some(count) = self.pending.get_mut(tag) {
            *count -= 1;
            if *count == 0 {
                self.pending.remove(tag);
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            statuses: self.statuses.clone(),
            favorites: self.favorites.clone(),
        }
    }
}

struct Inner {
    api: Arc<dyn ProgressApi>,
    storage: Box<dyn SnapshotStorage>,
    mirror: Mutex<Mirror>,
}

/// Cloneable handle; clones share one mirror
#[derive(Clone)]
pub struct ProblemStore {
    inner: Arc<Inner>,
}

impl ProblemStore {
    /// Build a store, restoring whatever the storage kept from earlier in the
    /// session
    pub fn new(api: Arc<dyn ProgressApi>, storage: Box<dyn SnapshotStorage>) -> Self {
        let mut mirror = Mirror::default();
        match storage.load() {
            Ok(Some(snapshot)) => {
                mirror.statuses = snapshot.statuses;
                mirror.statuses.retain(|_, status| !status.is_untouched());
                mirror.favorites = snapshot.favorites;
                mirror.initialized = true;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "discarding unreadable session snapshot"),
        }

        Self {
            inner: Arc::new(Inner {
                api,
                storage,
                mirror: Mutex::new(mirror),
            }),
        }
    }

    fn mirror(&self) -> MutexGuard<'_, Mirror> {
        self.inner
            .mirror
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Save `mirror` while its guard is still held, so saves land in the
    /// same order as the writes they capture
    fn persist(&self, mirror: &Mirror) {
        if let Err(e) = self.inner.storage.save(&mirror.snapshot()) {
            warn!(error = %e, "failed to persist session snapshot");
        }
    }

    /// True once the mirrors hold server state, either from `initialize` or
    /// restored from the session
    pub fn is_initialized(&self) -> bool {
        self.mirror().initialized
    }

    pub fn get_status(&self, problem_number: i64) -> ProblemStatus {
        self.mirror().status(problem_number)
    }

    pub fn is_favorite(&self, problem_id: i64) -> bool {
        self.mirror().favorites.contains(&problem_id)
    }

    pub fn is_pending(&self, tag: &str) -> bool {
        self.mirror().pending.contains_key(tag)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.mirror().snapshot()
    }

    /// Replace both mirrors wholesale with server state. In-flight requests
    /// keep their pending marks.
    pub fn initialize(
        &self,
        statuses: impl IntoIterator<Item = (i64, ProblemStatus)>,
        favorites: impl IntoIterator<Item = i64>,
    ) {
        let mut mirror = self.mirror();
        mirror.statuses = statuses
            .into_iter()
            .filter(|(_, status)| !status.is_untouched())
            .collect();
        mirror.favorites = favorites.into_iter().collect();
        mirror.initialized = true;
        self.persist(&mirror);
    }

    /// Fetch authoritative state from the server and `initialize` from it
    pub async fn sync(&self) -> Result<(), ClientError> {
        let snapshot = self.inner.api.fetch_snapshot().await?;
        debug!(
            statuses = snapshot.statuses.len(),
            favorites = snapshot.favorites.len(),
            "synced from server"
        );
        self.initialize(snapshot.statuses, snapshot.favorites);
        Ok(())
    }

    /// Forget the session: empty mirrors and drop the persisted snapshot
    pub fn reset(&self) {
        let mut mirror = self.mirror();
        *mirror = Mirror::default();
        if let Err(e) = self.inner.storage.clear() {
            warn!(error = %e, "failed to clear session snapshot");
        }
    }

    /// Apply `status` locally, then send it and roll back to the prior local
    /// value if the request fails.
    ///
    /// The local write happens when this is called, before the returned
    /// future is first polled.
    pub fn set_status(
        &self,
        problem_number: i64,
        status: ProblemStatus,
    ) -> impl Future<Output = Result<StatusUpdate, ClientError>> + Send + use<> {
        let previous = self.apply_status(problem_number, status);
        let store = self.clone();
        async move { store.send_status(problem_number, status, previous).await }
    }

    /// `set_status` for callers that cannot await. The local write is
    /// visible when this returns; the request runs on the shared runtime.
    pub fn spawn_set_status(
        &self,
        problem_number: i64,
        status: ProblemStatus,
    ) -> JoinHandle<Result<StatusUpdate, ClientError>> {
        runtime::spawn(self.set_status(problem_number, status))
    }

    fn apply_status(&self, problem_number: i64, status: ProblemStatus) -> ProblemStatus {
        let mut mirror = self.mirror();
        let previous = mirror.status(problem_number);
        mirror.put_status(problem_number, status);
        mirror.begin(&status_tag(problem_number));
        self.persist(&mirror);
        debug!(
            problem = problem_number,
            from = %previous,
            to = %status,
            "status applied locally"
        );
        previous
    }

    async fn send_status(
        &self,
        problem_number: i64,
        status: ProblemStatus,
        previous: ProblemStatus,
    ) -> Result<StatusUpdate, ClientError> {
        let result = self.inner.api.set_status(problem_number, status).await;

        let mut mirror = self.mirror();
        mirror.settle(&status_tag(problem_number));
        if let Err(e) = &result {
            mirror.put_status(problem_number, previous);
            self.persist(&mirror);
            warn!(
                problem = problem_number,
                attempted = %status,
                restored = %previous,
                kind = ?e.kind(),
                error = %e,
                "status update failed, rolled back"
            );
        }
        result
    }

    /// Flip favorite membership locally, then send it and restore the prior
    /// membership if the request fails. Applies at call time like
    /// `set_status`.
    pub fn toggle_favorite(
        &self,
        problem_id: i64,
    ) -> impl Future<Output = Result<FavoriteUpdate, ClientError>> + Send + use<> {
        let was_favorite = self.apply_favorite_toggle(problem_id);
        let store = self.clone();
        async move { store.send_favorite(problem_id, was_favorite).await }
    }

    pub fn spawn_toggle_favorite(
        &self,
        problem_id: i64,
    ) -> JoinHandle<Result<FavoriteUpdate, ClientError>> {
        runtime::spawn(self.toggle_favorite(problem_id))
    }

    fn apply_favorite_toggle(&self, problem_id: i64) -> bool {
        let mut mirror = self.mirror();
        let was_favorite = mirror.favorites.contains(&problem_id);
        mirror.put_favorite(problem_id, !was_favorite);
        mirror.begin(&favorite_tag(problem_id));
        self.persist(&mirror);
        debug!(
            problem_id,
            favorited = !was_favorite,
            "favorite applied locally"
        );
        was_favorite
    }

    async fn send_favorite(
        &self,
        problem_id: i64,
        was_favorite: bool,
    ) -> Result<FavoriteUpdate, ClientError> {
        let result = self.inner.api.set_favorite(problem_id, !was_favorite).await;

        let mut mirror = self.mirror();
        mirror.settle(&favorite_tag(problem_id));
        if let Err(e) = &result {
            mirror.put_favorite(problem_id, was_favorite);
            self.persist(&mirror);
            warn!(
                problem_id,
                restored = was_favorite,
                kind = ?e.kind(),
                error = %e,
                "favorite toggle failed, rolled back"
            );
        }
        result
    }
}
