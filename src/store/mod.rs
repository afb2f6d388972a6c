// SPDX-License-Identifier: MPL-2.0

mod db;
mod favorites;
mod history;
pub(crate) mod problems;
mod schema;
mod statuses;
mod tokens;

pub use db::Db;
pub use favorites::FavoriteRepo;
pub use history::HistoryRepo;
pub use problems::ProblemRepo;
pub use statuses::StatusRepo;
pub use tokens::TokenRepo;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("database path error: {0}")]
    Path(String),
}
