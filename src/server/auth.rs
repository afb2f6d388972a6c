// SPDX-License-Identifier: MPL-2.0

use crate::server::ApiError;
use crate::store::{Db, StoreError, TokenRepo};

/// Resolves a bearer credential to a user id. The rest of the server only
/// ever sees the user id.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, token: &str) -> Result<Option<String>, StoreError>;
}

/// Identity backed by the `api_tokens` table
pub struct TokenIdentity {
    db: Db,
}

impl TokenIdentity {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl IdentityProvider for TokenIdentity {
    fn resolve(&self, token: &str) -> Result<Option<String>, StoreError> {
        TokenRepo::new(&self.db).resolve(token)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` value
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub fn authenticate(
    identity: &dyn IdentityProvider,
    header: Option<&str>,
) -> Result<String, ApiError> {
    let token = bearer_token(header).ok_or(ApiError::Unauthorized)?;
    identity.resolve(token)?.ok_or(ApiError::Unauthorized)
}
