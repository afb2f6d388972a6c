// SPDX-License-Identifier: MPL-2.0

/// SQL schema for the row store. Timestamps are unix milliseconds.
pub const SCHEMA: &str = r#"
-- Database version for migrations
PRAGMA user_version = 1;

-- problems: the curated catalog, keyed internally by id and publicly by number
CREATE TABLE IF NOT EXISTS problems (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    number INTEGER NOT NULL UNIQUE,
    title TEXT NOT NULL,
    difficulty TEXT,
    phase TEXT,
    url TEXT
);

CREATE INDEX IF NOT EXISTS idx_problems_phase ON problems(phase, number);

-- problem_status: one row per (user, problem); no row means untouched
CREATE TABLE IF NOT EXISTS problem_status (
    user_id TEXT NOT NULL,
    problem_id INTEGER NOT NULL REFERENCES problems(id),
    status TEXT NOT NULL CHECK(status IN ('attempting', 'solved', 'revisit', 'skipped')),
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, problem_id)
);

-- status_history: append-only audit of committed transitions
CREATE TABLE IF NOT EXISTS status_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    problem_id INTEGER NOT NULL REFERENCES problems(id),
    from_status TEXT CHECK(from_status IN ('attempting', 'solved', 'revisit', 'skipped')),
    to_status TEXT NOT NULL
        CHECK(to_status IN ('untouched', 'attempting', 'solved', 'revisit', 'skipped')),
    changed_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_user ON status_history(user_id, changed_at DESC, id DESC);

CREATE TRIGGER IF NOT EXISTS status_history_no_update
BEFORE UPDATE ON status_history
BEGIN
    SELECT RAISE(ABORT, 'status_history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS status_history_no_delete
BEFORE DELETE ON status_history
BEGIN
    SELECT RAISE(ABORT, 'status_history is append-only');
END;

-- favorites: presence means favorited
CREATE TABLE IF NOT EXISTS favorites (
    user_id TEXT NOT NULL,
    problem_id INTEGER NOT NULL REFERENCES problems(id),
    created_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, problem_id)
);

-- api_tokens: opaque bearer tokens mapped to user ids
CREATE TABLE IF NOT EXISTS api_tokens (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_api_tokens_user ON api_tokens(user_id);
"#;
