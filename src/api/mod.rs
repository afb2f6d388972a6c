// SPDX-License-Identifier: MPL-2.0

mod client;
mod types;

pub use client::{ClientError, LadderClient};
pub use types::{
    ErrorBody, ErrorEnvelope, ErrorKind, FavoriteEntry, FavoriteRequest, FavoriteUpdate,
    HistoryEntry, HistoryPage, Problem, ProblemStatus, Stats, StatusEntry, StatusUpdate,
    StatusUpdateRequest, UnknownStatus,
};
