//! Bearer-token authentication.
//!
//! Tokens are opaque random strings. Only their SHA-256 digest is stored, on
//! `users.api_token_hash`; resolved users are cached briefly to keep lookups off the pool.

use crate::db_storage::CreditStorage;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::User;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Prefix of every issued API token.
pub const TOKEN_PREFIX: &str = "cbk_";

/// Prefix of every bank API key.
pub const BANK_KEY_PREFIX: &str = "cbb_";

/// Lowercase hex SHA-256 of `value`.
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// A fresh random secret with the given prefix (two v4 UUIDs, 256 bits of hex).
pub fn generate_secret(prefix: &str) -> String {
    format!(
        "{}{}{}",
        prefix,
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

pub fn generate_token() -> String {
    generate_secret(TOKEN_PREFIX)
}

pub fn generate_bank_key() -> String {
    generate_secret(BANK_KEY_PREFIX)
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves the user owning `token`, consulting the cache first.
///
/// # Returns
///
/// * `Ok(Some(User))` - Token matches a user (active or not).
/// * `Ok(None)` - Unknown token.
pub async fn resolve_token(state: &AppState, token: &str) -> Result<Option<User>, AppError> {
    let token_hash = sha256_hex(token);

    if let Some(user) = state.user_cache.get(&token_hash).await {
        return Ok(Some(user));
    }

    let storage = CreditStorage::new(state.db.clone());
    let user = storage.find_user_by_token_hash(&token_hash).await?;

    if let Some(ref user) = user {
        state.user_cache.insert(token_hash, user.clone()).await;
        if let Err(e) = storage.touch_user(user.id).await {
            tracing::warn!("Failed to update last_seen_at for {}: {}", user.id, e);
        }
    }

    Ok(user)
}

/// Drops every cached entry for the user, e.g. after deactivation or token rotation.
pub async fn forget_user(state: &AppState, user_id: Uuid) {
    if let Err(e) = state
        .user_cache
        .invalidate_entries_if(move |_, cached| cached.id == user_id)
    {
        tracing::warn!("Failed to invalidate cached user {}: {}", user_id, e);
    }
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        let user = resolve_token(state, token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Could not validate credentials".to_string()))?;

        if !user.is_active {
            return Err(AppError::Forbidden("User account is inactive".to_string()));
        }

        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_sha256_hex_is_stable() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_generated_tokens_are_unique_and_prefixed() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.starts_with(TOKEN_PREFIX));
        assert_eq!(a.len(), TOKEN_PREFIX.len() + 64);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer cbk_123"));
        assert_eq!(bearer_token(&headers), Some("cbk_123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }
}
