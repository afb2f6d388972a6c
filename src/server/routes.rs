// SPDX-License-Identifier: MPL-2.0

use crate::api::{FavoriteRequest, FavoriteUpdate, ProblemStatus, Stats, StatusUpdateRequest};
use crate::config::HISTORY_DEFAULT_LIMIT;
use crate::server::auth::{IdentityProvider, authenticate};
use crate::server::{ApiError, StatusWriter};
use crate::store::{Db, FavoriteRepo, HistoryRepo, ProblemRepo, StatusRepo};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Delete,
    Other,
}

/// Transport-independent view of an incoming request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub verb: Verb,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: String,
}

impl ApiRequest {
    /// Split a raw request target (`/api/history?limit=5`) into path and query
    pub fn new(verb: Verb, target: &str, authorization: Option<String>, body: String) -> Self {
        let (path, query) = match url::Url::parse("http://localhost")
            .and_then(|base| base.join(target))
        {
            Ok(url) => (
                url.path().to_string(),
                url.query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect(),
            ),
            Err(_) => (target.to_string(), HashMap::new()),
        };

        Self {
            verb,
            path,
            query,
            authorization,
            body,
        }
    }

    fn query_usize(&self, key: &str, default: usize) -> Result<usize, ApiError> {
        match self.query.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("{key} must be a non-negative integer"))),
        }
    }
}

/// Successful reply: status code plus JSON body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

impl ApiReply {
    fn ok<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        Ok(Self {
            status: 200,
            body: serde_json::to_string(value).map_err(crate::store::StoreError::from)?,
        })
    }
}

/// Maps requests onto the store. One router is shared by every worker.
pub struct Router {
    db: Db,
    identity: Box<dyn IdentityProvider>,
}

impl Router {
    pub fn new(db: Db, identity: Box<dyn IdentityProvider>) -> Self {
        Self { db, identity }
    }

    pub fn handle(&self, request: &ApiRequest) -> Result<ApiReply, ApiError> {
        match (request.path.as_str(), request.verb) {
            ("/health", Verb::Get) => ApiReply::ok(&serde_json::json!({ "status": "ok" })),
            ("/api/problems", Verb::Get) => ApiReply::ok(&ProblemRepo::new(&self.db).list()?),
            ("/api/status", Verb::Get) => {
                let user = self.user(request)?;
                ApiReply::ok(&StatusRepo::new(&self.db).list(&user)?)
            }
            ("/api/status", Verb::Post) => {
                let user = self.user(request)?;
                let body: StatusUpdateRequest = serde_json::from_str(&request.body)?;
                let update = StatusWriter::new(&self.db).update_status(
                    &user,
                    body.problem_number,
                    &body.status,
                )?;
                ApiReply::ok(&update)
            }
            ("/api/history", Verb::Get) => {
                let user = self.user(request)?;
                let limit = request.query_usize("limit", HISTORY_DEFAULT_LIMIT)?;
                let offset = request.query_usize("offset", 0)?;
                ApiReply::ok(&HistoryRepo::new(&self.db).recent(&user, limit, offset)?)
            }
            ("/api/favorites", Verb::Get) => {
                let user = self.user(request)?;
                ApiReply::ok(&FavoriteRepo::new(&self.db).list(&user)?)
            }
            ("/api/favorites", verb @ (Verb::Post | Verb::Delete)) => {
                let user = self.user(request)?;
                let body: FavoriteRequest = serde_json::from_str(&request.body)?;
                ApiReply::ok(&self.set_favorite(&user, body.problem_id, verb == Verb::Post)?)
            }
            ("/api/stats", Verb::Get) => {
                let user = self.user(request)?;
                ApiReply::ok(&self.stats(&user)?)
            }
            ("/health" | "/api/problems" | "/api/status" | "/api/history" | "/api/favorites"
            | "/api/stats", _) => Err(ApiError::BadRequest(format!(
                "method not allowed on {}",
                request.path
            ))),
            (path, _) => Err(ApiError::NotFound(format!("no route for {path}"))),
        }
    }

    fn user(&self, request: &ApiRequest) -> Result<String, ApiError> {
        authenticate(self.identity.as_ref(), request.authorization.as_deref())
    }

    fn set_favorite(
        &self,
        user: &str,
        problem_id: i64,
        favorited: bool,
    ) -> Result<FavoriteUpdate, ApiError> {
        if ProblemRepo::new(&self.db).find_by_id(problem_id)?.is_none() {
            return Err(ApiError::NotFound(format!("problem id {problem_id} not found")));
        }

        let repo = FavoriteRepo::new(&self.db);
        if favorited {
            repo.add(user, problem_id)?;
        } else {
            repo.remove(user, problem_id)?;
        }

        Ok(FavoriteUpdate {
            problem_id,
            favorited,
        })
    }

    fn stats(&self, user: &str) -> Result<Stats, ApiError> {
        let total_problems = ProblemRepo::new(&self.db).count()?;
        let counts = StatusRepo::new(&self.db).counts(user)?;
        let count = |status: ProblemStatus| counts.get(&status).copied().unwrap_or(0);
        let touched: i64 = counts.values().sum();

        Ok(Stats {
            total_problems,
            attempting: count(ProblemStatus::Attempting),
            solved: count(ProblemStatus::Solved),
            revisit: count(ProblemStatus::Revisit),
            skipped: count(ProblemStatus::Skipped),
            untouched: (total_problems - touched).max(0),
            favorites: FavoriteRepo::new(&self.db).count(user)?,
        })
    }
}
