//! Job-seeker profiles. One per user.

use axum::extract::{
    Path, Query, State,
    rejection::{PathRejection, QueryRejection},
};
use jobby_core::ProfileId;
use std::sync::Arc;

use crate::auth::{AppState, RequireAuth};
use crate::cache::invalidate_quietly;
use crate::db::{CreateProfile, NewProfile, ProfileChanges, ProfileRecord};
use crate::error::ApiError;
use crate::extract::ValidateJson;
use crate::response::{ApiResponse, Page, PageNumberQuery, Pagination};

const RESOURCE: &str = "profile";

/// Creates the caller's profile.
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    ValidateJson(body): ValidateJson<NewProfile>,
) -> Result<ApiResponse<ProfileRecord>, ApiError> {
    match state.profiles.create(caller.user_id(), &body).await? {
        CreateProfile::Created(profile) => {
            // The cached account still says "no profile".
            invalidate_quietly(state.user_cache.as_ref(), caller.user().provider_id()).await;
            Ok(ApiResponse::created("successfully created profile", profile))
        }
        CreateProfile::AlreadyExists => Err(ApiError::bad_request(
            "a profile already exists for your account. Please contact support for assistance",
        )),
        CreateProfile::Inactive => Err(ApiError::bad_request(
            "your profile is currently inactive. Please contact support to restore your profile",
        )),
    }
}

/// Lists active profiles.
pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageNumberQuery>, QueryRejection>,
) -> Result<ApiResponse<Page<ProfileRecord>>, ApiError> {
    let Query(query) = query?;
    let pagination = Pagination::from(&query);

    let (profiles, total) = state.profiles.list(pagination).await?;
    Ok(ApiResponse::ok(
        "successfully fetched profiles",
        Page::new(profiles, total, pagination),
    ))
}

async fn owned_profile(
    state: &AppState,
    caller: &jobby_platform_access::AuthenticatedUser,
    id: ProfileId,
) -> Result<ProfileRecord, ApiError> {
    let profile = state
        .profiles
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?;
    caller.ensure_owns_profile(profile.id, RESOURCE)?;
    Ok(profile)
}

/// Returns one profile.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    id: Result<Path<ProfileId>, PathRejection>,
) -> Result<ApiResponse<ProfileRecord>, ApiError> {
    let Path(id) = id?;
    let profile = owned_profile(&state, &caller, id).await?;
    Ok(ApiResponse::ok("Successfully fetched profile", profile))
}

/// Updates one profile.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    id: Result<Path<ProfileId>, PathRejection>,
    ValidateJson(changes): ValidateJson<ProfileChanges>,
) -> Result<ApiResponse<ProfileRecord>, ApiError> {
    let Path(id) = id?;
    owned_profile(&state, &caller, id).await?;
    let profile = state
        .profiles
        .update(id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?;
    Ok(ApiResponse::ok("Successfully updated profile", profile))
}

/// Soft-deletes one profile.
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    id: Result<Path<ProfileId>, PathRejection>,
) -> Result<ApiResponse<()>, ApiError> {
    let Path(id) = id?;
    let profile = owned_profile(&state, &caller, id).await?;

    if !state.profiles.soft_delete(id).await? {
        return Err(ApiError::not_found("profile already deleted"));
    }

    // The owner's cached account still points at the deleted profile.
    if let Some(owner) = state.users.find_provider_id(profile.user_id).await? {
        invalidate_quietly(state.user_cache.as_ref(), &owner).await;
    }
    Ok(ApiResponse::ok("Successfully deleted profile", ()))
}
