//! User administration and the caller's own account.

use axum::extract::{
    Path, Query, State,
    rejection::{PathRejection, QueryRejection},
};
use jobby_core::{SubscriberId, UserId};
use jobby_platform_access::{Role, User, hash_password, require_password};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use validator::Validate;

use crate::auth::{AppState, RequireAuth};
use crate::cache::invalidate_quietly;
use crate::db::{Reinstate, UserChanges, UserFilter, is_unique_violation};
use crate::error::ApiError;
use crate::extract::{ValidateJson, not_blank};
use crate::notify::NotificationJob;
use crate::response::{ApiResponse, Page, Pagination};

const DUPLICATE_USER: &str = "user with the same email or mobile number already exists";

/// `GET /users` query: pagination plus optional filters.
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub mobile_number: Option<String>,
    pub role: Option<String>,
    pub provider_id: Option<String>,
    pub subscriber_id: Option<String>,
}

impl UserListQuery {
    fn filter(self) -> Result<UserFilter, ApiError> {
        let role = non_empty(self.role)
            .map(|r| Role::from_str(&r))
            .transpose()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let subscriber_id = non_empty(self.subscriber_id)
            .map(|s| SubscriberId::from_str(&s))
            .transpose()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        Ok(UserFilter {
            name: non_empty(self.name),
            email: non_empty(self.email),
            picture: non_empty(self.picture),
            mobile_number: non_empty(self.mobile_number),
            role,
            provider_id: non_empty(self.provider_id),
            subscriber_id,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Body of `POST /users`.
#[derive(Debug, Deserialize, Validate)]
pub struct NewAdmin {
    #[validate(custom(function = "not_blank", message = "name is required"))]
    pub name: String,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[serde(default)]
    pub picture: String,
    #[validate(custom(function = "not_blank", message = "mobile number is required"))]
    pub mobile_number: String,
    pub password: String,
}

/// Lists active users.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UserListQuery>, QueryRejection>,
) -> Result<ApiResponse<Page<User>>, ApiError> {
    let Query(query) = query?;
    let pagination = Pagination::new(query.page, query.per_page);
    let filter = query.filter()?;

    let (users, total) = state.users.list(&filter, pagination).await?;
    Ok(ApiResponse::ok(
        "successfully fetched users",
        Page::new(users, total, pagination),
    ))
}

/// Creates an administrator with a local password.
pub async fn create_admin(
    State(state): State<Arc<AppState>>,
    ValidateJson(body): ValidateJson<NewAdmin>,
) -> Result<ApiResponse<User>, ApiError> {
    let password_hash = hash_password(require_password(&body.password)?)?;

    let subscriber_id = SubscriberId::new();
    let admin = User::new(format!("admin|{subscriber_id}"), Role::Admin)
        .with_subscriber_id(subscriber_id)
        .with_name(body.name.trim())
        .with_email(body.email.trim())
        .with_picture(body.picture)
        .with_mobile_number(Some(body.mobile_number.trim().to_string()));

    let created = state
        .users
        .create(&admin, Some(&password_hash))
        .await?
        .ok_or_else(|| ApiError::bad_request(DUPLICATE_USER))?;

    tracing::info!(user_id = %created.id(), "Created administrator");
    state
        .notifications
        .dispatch(NotificationJob::onboard(&created));
    Ok(ApiResponse::created("successfully created admin", created))
}

/// Returns the caller's own account.
pub async fn get_me(RequireAuth(caller): RequireAuth) -> ApiResponse<User> {
    ApiResponse::ok("successfully fetched user", caller.user().clone())
}

/// Updates the caller's own details.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    ValidateJson(changes): ValidateJson<UserChanges>,
) -> Result<ApiResponse<User>, ApiError> {
    if changes.name.is_none()
        && changes.email.is_none()
        && changes.picture.is_none()
        && changes.mobile_number.is_none()
    {
        return Err(ApiError::bad_request("please add at least one value"));
    }

    let updated = match state.users.update(caller.user_id(), &changes).await {
        Ok(updated) => updated,
        Err(e) if is_unique_violation(&e) => return Err(ApiError::bad_request(DUPLICATE_USER)),
        Err(e) => return Err(e.into()),
    }
    .ok_or_else(|| ApiError::not_found("user not found"))?;

    invalidate_quietly(state.user_cache.as_ref(), caller.user().provider_id()).await;
    Ok(ApiResponse::ok("successfully updated user", updated))
}

/// Soft-deletes the caller's own account.
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
) -> Result<ApiResponse<()>, ApiError> {
    if !state.users.soft_delete(caller.user_id()).await? {
        return Err(ApiError::not_found("user already deleted"));
    }

    invalidate_quietly(state.user_cache.as_ref(), caller.user().provider_id()).await;
    tracing::info!(user_id = %caller.user_id(), "User deleted own account");
    Ok(ApiResponse::ok("successfully deleted user", ()))
}

/// Restores a soft-deleted user.
pub async fn reinstate_user(
    State(state): State<Arc<AppState>>,
    id: Result<Path<UserId>, PathRejection>,
) -> Result<ApiResponse<User>, ApiError> {
    let Path(id) = id?;
    match state.users.reinstate(id).await? {
        Reinstate::Reinstated(user) => {
            tracing::info!(user_id = %id, "Reinstated user");
            Ok(ApiResponse::ok("successfully reinstated user", user))
        }
        Reinstate::NotDeleted => Err(ApiError::bad_request("this account wasn't deleted")),
        Reinstate::NotFound => Err(ApiError::not_found("user not found")),
    }
}
