// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

pub const APP_ID: &str = "io.github.ladder";
pub const APP_NAME: &str = "Ladder";

#[cfg(feature = "devel")]
pub const IS_DEVEL: bool = true;
#[cfg(not(feature = "devel"))]
pub const IS_DEVEL: bool = false;

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
pub const DEFAULT_WORKERS: usize = 4;

/// Most recent history entries the server will ever return
pub const HISTORY_WINDOW: usize = 500;
/// Page size used when the caller does not ask for one
pub const HISTORY_DEFAULT_LIMIT: usize = 50;

/// Entries per page in the client history pager
pub const HISTORY_PAGE_SIZE: usize = 20;
/// Client history pager stops after this many entries
pub const HISTORY_CLIENT_CAP: usize = 200;

/// Default database location (~/.local/share/ladder/ladder.db)
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ladder")
        .join(if IS_DEVEL { "ladder-devel.db" } else { "ladder.db" })
}

/// Session snapshot location. Prefers the runtime dir so the file goes away
/// with the login session.
pub fn session_snapshot_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_ID)
        .join("session.json")
}
