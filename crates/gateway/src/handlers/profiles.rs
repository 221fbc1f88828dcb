//! Profile handlers

use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::ListQuery;
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::AppState;
use minjok_common::{
    db::models::{AdminType, Profile, Role},
    errors::Result,
    pagination::Page,
};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,

    /// Empty string clears the intro
    #[validate(length(max = 2000))]
    pub intro: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRolesRequest {
    pub role: Option<Role>,
    pub admin_type: Option<AdminType>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Drop the caller's cached profile after a change that affects it
async fn forget_session(state: &AppState, user: &CurrentUser) {
    if let Err(e) = state.profile_cache.invalidate(&user.token).await {
        tracing::warn!(user_id = %user.actor.id, error = %e, "Failed to invalidate cached profile");
    }
}

pub async fn me(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Profile>> {
    let profile = state.services.profiles.current(&user.actor).await?;
    Ok(Json(profile))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<Profile>> {
    request.validate()?;

    let profile = state
        .services
        .profiles
        .update_own(&user.actor, request.full_name, request.intro)
        .await?;

    forget_session(&state, &user).await;
    Ok(Json(profile))
}

/// Admin directory of every profile
pub async fn list_profiles(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Page<Profile>>> {
    let page = state
        .services
        .profiles
        .list(&user.actor, query.page, query.per_page)
        .await?;
    Ok(Json(page))
}

/// Co-author picker lookup
pub async fn search_profiles(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<Vec<Profile>>> {
    let profiles = state.services.profiles.search(&query.q).await?;
    Ok(Json(profiles))
}

pub async fn update_roles(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(profile_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateRolesRequest>,
) -> Result<Json<Profile>> {
    let profile = state
        .services
        .profiles
        .update_roles(&user.actor, profile_id, request.role, request.admin_type)
        .await?;

    if profile_id == user.actor.id {
        forget_session(&state, &user).await;
    }
    Ok(Json(profile))
}
