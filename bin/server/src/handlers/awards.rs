//! Awards listed on a job-seeker profile.

use axum::extract::{
    Path, Query, State,
    rejection::{PathRejection, QueryRejection},
};
use jobby_core::AwardId;
use jobby_platform_access::AuthenticatedUser;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::auth::{AppState, RequireAuth};
use crate::db::{AwardChanges, AwardFilter, AwardRecord, NewAward};
use crate::error::ApiError;
use crate::extract::ValidateJson;
use crate::response::{ApiResponse, Page, Pagination};

const RESOURCE: &str = "award";

/// `GET /awards` query.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AwardListQuery {
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1900, max = 2100, message = "Year must be between 1900 and 2100"))]
    pub year: Option<i32>,
}

impl AwardListQuery {
    fn filter(&self) -> AwardFilter {
        AwardFilter {
            title: self.title.clone().filter(|t| !t.is_empty()),
            description: self.description.clone().filter(|d| !d.is_empty()),
            year: self.year,
        }
    }
}

/// Adds an award to the caller's profile.
pub async fn create_award(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    ValidateJson(body): ValidateJson<NewAward>,
) -> Result<ApiResponse<AwardRecord>, ApiError> {
    let profile_id = caller
        .profile_id()
        .ok_or_else(|| ApiError::bad_request("you don't have a profile"))?;

    let award = state.awards.create(profile_id, &body).await?;
    Ok(ApiResponse::created("Successfully created award", award))
}

/// Lists awards across all profiles.
pub async fn list_awards(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AwardListQuery>, QueryRejection>,
) -> Result<ApiResponse<Page<AwardRecord>>, ApiError> {
    let Query(query) = query?;
    query.validate()?;
    let filter = query.filter();
    let pagination = Pagination::new(query.page_number, query.page_size);

    let (awards, total) = state.awards.list(&filter, pagination).await?;
    Ok(ApiResponse::ok(
        "successfully fetched awards",
        Page::new(awards, total, pagination),
    ))
}

async fn owned_award(
    state: &AppState,
    caller: &AuthenticatedUser,
    id: AwardId,
) -> Result<AwardRecord, ApiError> {
    let award = state
        .awards
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("award not found"))?;
    caller.ensure_owns_profile(award.profile_id, RESOURCE)?;
    Ok(award)
}

/// Returns one award.
pub async fn get_award(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    id: Result<Path<AwardId>, PathRejection>,
) -> Result<ApiResponse<AwardRecord>, ApiError> {
    let Path(id) = id?;
    let award = owned_award(&state, &caller, id).await?;
    Ok(ApiResponse::ok("Successfully fetched award", award))
}

/// Merges changes into one award.
pub async fn update_award(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    id: Result<Path<AwardId>, PathRejection>,
    ValidateJson(changes): ValidateJson<AwardChanges>,
) -> Result<ApiResponse<AwardRecord>, ApiError> {
    let Path(id) = id?;

    owned_award(&state, &caller, id).await?;
    let award = state
        .awards
        .update(id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("award not found"))?;
    Ok(ApiResponse::ok("Successfully updated award", award))
}

/// Soft-deletes one award.
pub async fn delete_award(
    State(state): State<Arc<AppState>>,
    RequireAuth(caller): RequireAuth,
    id: Result<Path<AwardId>, PathRejection>,
) -> Result<ApiResponse<()>, ApiError> {
    let Path(id) = id?;
    owned_award(&state, &caller, id).await?;

    if !state.awards.soft_delete(id).await? {
        return Err(ApiError::not_found("award already deleted"));
    }
    Ok(ApiResponse::ok("Successfully deleted award", ()))
}
