// SPDX-License-Identifier: MPL-2.0

use crate::api::{ErrorBody, ErrorEnvelope, ErrorKind};
use crate::store::StoreError;
use thiserror::Error;

/// Failures surfaced at the request boundary. Each maps to one fixed HTTP
/// status through its `ErrorKind`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Internal(#[from] StoreError),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest(_) => ErrorKind::BadRequest,
            ApiError::Unauthorized => ErrorKind::Unauthorized,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Internal(_) => ErrorKind::InternalError,
        }
    }

    pub fn status(&self) -> u16 {
        self.kind().http_status()
    }

    /// Wire form. Storage details stay in the logs.
    pub fn envelope(&self) -> ErrorEnvelope {
        let message = match self {
            ApiError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        ErrorEnvelope {
            error: ErrorBody {
                code: self.kind(),
                message,
                status: self.status(),
            },
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("malformed body: {e}"))
    }
}
