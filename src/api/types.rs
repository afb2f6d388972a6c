// SPDX-License-Identifier: MPL-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-user progress on a single problem.
///
/// `Untouched` is never stored: a missing row means untouched.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProblemStatus {
    #[default]
    Untouched,
    Attempting,
    Solved,
    Revisit,
    Skipped,
}

impl ProblemStatus {
    pub const ALL: [ProblemStatus; 5] = [
        ProblemStatus::Untouched,
        ProblemStatus::Attempting,
        ProblemStatus::Solved,
        ProblemStatus::Revisit,
        ProblemStatus::Skipped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProblemStatus::Untouched => "untouched",
            ProblemStatus::Attempting => "attempting",
            ProblemStatus::Solved => "solved",
            ProblemStatus::Revisit => "revisit",
            ProblemStatus::Skipped => "skipped",
        }
    }

    pub fn is_untouched(self) -> bool {
        self == ProblemStatus::Untouched
    }
}

impl fmt::Display for ProblemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status {:?}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ProblemStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Body of `POST /api/status`. The status stays a raw string so an unknown
/// value can be reported as a bad request instead of a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub problem_number: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub problem_number: i64,
    pub status: ProblemStatus,
    pub previous_status: ProblemStatus,
}

/// One row of the caller's current progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub problem_number: i64,
    pub status: ProblemStatus,
    pub updated_at: DateTime<Utc>,
}

/// History record with the problem's display fields folded in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub problem_id: i64,
    pub problem_number: i64,
    pub problem_title: String,
    pub difficulty: Option<String>,
    pub from_status: Option<ProblemStatus>,
    pub to_status: ProblemStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub problem_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteUpdate {
    pub problem_id: i64,
    pub favorited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEntry {
    pub problem_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry as served by `GET /api/problems` and read by `ladder import`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(default)]
    pub id: i64,
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_problems: i64,
    pub attempting: i64,
    pub solved: i64,
    pub revisit: i64,
    pub skipped: i64,
    pub untouched: i64,
    pub favorites: i64,
}

/// Machine-checkable failure kinds shared by server and client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    InternalError,
}

impl ErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::InternalError => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorKind,
    pub message: String,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_accepts_all_five() {
        for status in ProblemStatus::ALL {
            assert_eq!(status.as_str().parse::<ProblemStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_status_parse_rejects_unknown_and_case_variants() {
        assert!("done".parse::<ProblemStatus>().is_err());
        assert!("Solved".parse::<ProblemStatus>().is_err());
        assert!("".parse::<ProblemStatus>().is_err());
    }

    #[test]
    fn test_status_update_wire_shape() {
        let update = StatusUpdate {
            problem_number: 42,
            status: ProblemStatus::Solved,
            previous_status: ProblemStatus::Untouched,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "problemNumber": 42,
                "status": "solved",
                "previousStatus": "untouched"
            })
        );
    }

    #[test]
    fn test_error_kind_codes() {
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: ErrorKind::NotFound,
                message: "problem 7 not found".into(),
                status: ErrorKind::NotFound.http_status(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["status"], 404);
        assert_eq!(ErrorKind::InternalError.as_str(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_catalog_entry_defaults() {
        let problem: Problem =
            serde_json::from_str(r#"{"number": 1, "title": "Two Sum"}"#).unwrap();
        assert_eq!(problem.id, 0);
        assert_eq!(problem.difficulty, None);
        assert_eq!(problem.phase, None);
    }
}
