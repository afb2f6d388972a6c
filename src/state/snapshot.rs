// SPDX-License-Identifier: MPL-2.0

use crate::api::ProblemStatus;
use crate::config::session_snapshot_path;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot: {0}")]
    InvalidData(#[from] serde_json::Error),
}

/// Serialized form of the client mirrors. Pending operations are never part
/// of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// problem number -> status, untouched omitted
    #[serde(default)]
    pub statuses: BTreeMap<i64, ProblemStatus>,
    /// favorited problem ids
    #[serde(default)]
    pub favorites: BTreeSet<i64>,
}

/// Where snapshots live between navigations. Implementations only need to
/// outlast the current session.
pub trait SnapshotStorage: Send + Sync {
    fn load(&self) -> Result<Option<SessionSnapshot>, SnapshotError>;
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError>;
    fn clear(&self) -> Result<(), SnapshotError>;
}

/// JSON file, by default under the runtime dir so it dies with the login
/// session
pub struct FileSnapshotStorage {
    path: PathBuf,
}

impl FileSnapshotStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn session_default() -> Self {
        Self::new(session_snapshot_path())
    }
}

impl SnapshotStorage for FileSnapshotStorage {
    fn load(&self) -> Result<Option<SessionSnapshot>, SnapshotError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves half a file behind
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(snapshot)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SnapshotError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-lifetime storage
#[derive(Default)]
pub struct MemorySnapshotStorage {
    slot: Mutex<Option<SessionSnapshot>>,
}

impl SnapshotStorage for MemorySnapshotStorage {
    fn load(&self) -> Result<Option<SessionSnapshot>, SnapshotError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SnapshotError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionSnapshot {
        let mut snapshot = SessionSnapshot::default();
        snapshot.statuses.insert(42, ProblemStatus::Solved);
        snapshot.statuses.insert(7, ProblemStatus::Revisit);
        snapshot.favorites.insert(3);
        snapshot
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSnapshotStorage::new(dir.path().join("a").join("session.json"));

        assert_eq!(storage.load().unwrap(), None);
        storage.save(&sample()).unwrap();
        assert_eq!(storage.load().unwrap(), Some(sample()));

        storage.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
        // Clearing twice is fine
        storage.clear().unwrap();
    }

    #[test]
    fn test_file_storage_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let storage = FileSnapshotStorage::new(path);
        assert!(matches!(storage.load(), Err(SnapshotError::InvalidData(_))));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["statuses"]["42"], "solved");
        assert_eq!(json["favorites"], serde_json::json!([3]));
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemorySnapshotStorage::default();
        storage.save(&sample()).unwrap();
        assert_eq!(storage.load().unwrap(), Some(sample()));
        storage.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }
}
