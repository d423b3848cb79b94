//! Request authenticator, role gate and caller extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jobby_platform_access::{
    AuthenticatedUser, AuthenticationError, AuthorizationError, RoleAllowList, UserAccount,
};
use std::sync::Arc;

use super::AppState;
use crate::cache::UserCache;
use crate::db::UserRepository;
use crate::error::ApiError;

const BEARER_PREFIX: &str = "Bearer ";

/// Validates the bearer token and attaches the caller to the request.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;
    let claims = state.tokens.verify(token)?;
    let account =
        resolve_account(state.user_cache.as_ref(), &state.users, &claims.provider_id).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser::new(account));
    Ok(next.run(request).await)
}

/// Rejects callers whose role is not in the route's allow-list.
///
/// Must run inside [`authenticate`].
pub async fn require_roles(
    State(allowed): State<RoleAllowList>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or(AuthorizationError::NotAuthenticated)?;
    caller.authorize(allowed)?;
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthenticationError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthenticationError::MissingCredential)
}

/// Loads the account for `provider_id`, preferring the cache.
///
/// Cache failures are logged and treated as a miss.
async fn resolve_account(
    cache: &dyn UserCache,
    users: &UserRepository,
    provider_id: &str,
) -> Result<UserAccount, ApiError> {
    match cache.get(provider_id).await {
        Ok(Some(account)) => return Ok(account),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, provider_id, "User cache read failed"),
    }

    let account = users
        .find_account_by_provider_id(provider_id)
        .await?
        .ok_or_else(|| AuthenticationError::UserNotFound {
            provider_id: provider_id.to_string(),
        })?;

    if let Err(e) = cache.put(&account).await {
        tracing::warn!(error = %e, provider_id, "User cache write failed");
    }
    Ok(account)
}

/// Extractor for the authenticated caller.
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| AuthorizationError::NotAuthenticated.into())
    }
}
