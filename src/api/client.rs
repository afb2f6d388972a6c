// SPDX-License-Identifier: MPL-2.0

use crate::api::types::{
    ErrorEnvelope, ErrorKind, FavoriteEntry, FavoriteRequest, FavoriteUpdate, HistoryEntry,
    HistoryPage, Problem, ProblemStatus, Stats, StatusEntry, StatusUpdate, StatusUpdateRequest,
};
use crate::config::{HISTORY_CLIENT_CAP, HISTORY_PAGE_SIZE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("{} ({status}): {message}", .kind.as_str())]
    Api {
        kind: ErrorKind,
        status: u16,
        message: String,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("not authenticated")]
    NotAuthenticated,
}

impl ClientError {
    /// Failure kind, if the server produced one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Api { kind, .. } => Some(*kind),
            ClientError::NotAuthenticated => Some(ErrorKind::Unauthorized),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

/// HTTP client for the ladder server. Keeps the rest of the app on our own
/// types; nothing outside this file sees `reqwest`.
#[derive(Clone)]
pub struct LadderClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl LadderClient {
    pub fn with_server(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        if self.token.is_none() {
            return Err(ClientError::NotAuthenticated);
        }
        Ok(self.request(method, path))
    }

    /// Turn a response into `T`, or into `ClientError::Api` for non-2xx
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!(status = code, body = %body, "request failed");

        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => Err(ClientError::Api {
                kind: envelope.error.code,
                status: envelope.error.status,
                message: envelope.error.message,
            }),
            Err(_) => Err(ClientError::Api {
                kind: kind_for_status(code),
                status: code,
                message: body,
            }),
        }
    }

    pub async fn problems(&self) -> Result<Vec<Problem>, ClientError> {
        let response = self.request(Method::GET, "/api/problems").send().await?;
        Self::decode(response).await
    }

    /// Current status rows for the signed-in user
    pub async fn statuses(&self) -> Result<Vec<StatusEntry>, ClientError> {
        let response = self.authed(Method::GET, "/api/status")?.send().await?;
        Self::decode(response).await
    }

    pub async fn update_status(
        &self,
        problem_number: i64,
        status: ProblemStatus,
    ) -> Result<StatusUpdate, ClientError> {
        let body = StatusUpdateRequest {
            problem_number,
            status: status.as_str().to_string(),
        };
        let response = self
            .authed(Method::POST, "/api/status")?
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn history(&self, limit: usize, offset: usize) -> Result<HistoryPage, ClientError> {
        let response = self
            .authed(Method::GET, "/api/history")?
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Fixed-size history page for display. Pages past the client cap come
    /// back empty.
    pub async fn history_page(&self, page: usize) -> Result<HistoryPage, ClientError> {
        let offset = page * HISTORY_PAGE_SIZE;
        if offset >= HISTORY_CLIENT_CAP {
            return Ok(HistoryPage {
                entries: Vec::new(),
                offset,
                limit: HISTORY_PAGE_SIZE,
                has_more: false,
            });
        }

        let limit = HISTORY_PAGE_SIZE.min(HISTORY_CLIENT_CAP - offset);
        let mut page = self.history(limit, offset).await?;
        page.has_more = page.has_more && offset + page.entries.len() < HISTORY_CLIENT_CAP;
        Ok(page)
    }

    /// Every history entry the client is allowed to show, newest first
    pub async fn all_history(&self) -> Result<Vec<HistoryEntry>, ClientError> {
        let mut entries = Vec::new();
        let mut page_index = 0;
        loop {
            let page = self.history_page(page_index).await?;
            entries.extend(page.entries);
            if !page.has_more {
                break;
            }
            page_index += 1;
        }
        Ok(entries)
    }

    pub async fn favorites(&self) -> Result<Vec<FavoriteEntry>, ClientError> {
        let response = self.authed(Method::GET, "/api/favorites")?.send().await?;
        Self::decode(response).await
    }

    pub async fn add_favorite(&self, problem_id: i64) -> Result<FavoriteUpdate, ClientError> {
        let response = self
            .authed(Method::POST, "/api/favorites")?
            .json(&FavoriteRequest { problem_id })
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn remove_favorite(&self, problem_id: i64) -> Result<FavoriteUpdate, ClientError> {
        let response = self
            .authed(Method::DELETE, "/api/favorites")?
            .json(&FavoriteRequest { problem_id })
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn stats(&self) -> Result<Stats, ClientError> {
        let response = self.authed(Method::GET, "/api/stats")?.send().await?;
        Self::decode(response).await
    }
}

fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::BadRequest,
        401 | 403 => ErrorKind::Unauthorized,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        _ => ErrorKind::InternalError,
    }
}
