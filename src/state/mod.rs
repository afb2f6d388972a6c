// SPDX-License-Identifier: MPL-2.0

mod remote;
mod snapshot;
mod store;

pub use remote::ProgressApi;
pub use snapshot::{FileSnapshotStorage, MemorySnapshotStorage, SessionSnapshot, SnapshotStorage};
pub use store::{ProblemStore, favorite_tag, status_tag};
