//! Volume catalog handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::FormData;
use crate::extract::{ApiPath, CurrentUser, OptionalUser};
use crate::AppState;
use minjok_common::{
    db::models::{Issue, Volume},
    errors::Result,
    services::{NewVolume, VolumeDetail},
};

pub async fn list_volumes(
    State(state): State<AppState>,
    viewer: OptionalUser,
) -> Result<Json<Vec<Volume>>> {
    let volumes = state.services.catalog.list_volumes(viewer.actor()).await?;
    Ok(Json(volumes))
}

/// Released issues not yet placed in a volume
pub async fn available_issues(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Issue>>> {
    let issues = state.services.catalog.available_issues(&user.actor).await?;
    Ok(Json(issues))
}

/// Create a volume (multipart like issues, with repeated `issue_id`)
pub async fn create_volume(
    State(state): State<AppState>,
    user: CurrentUser,
    mut form: FormData,
) -> Result<(StatusCode, Json<Volume>)> {

    let new = NewVolume {
        title: form.text("title").unwrap_or_default(),
        description: form.text("description"),
        status: form.status()?,
        release_date: form.release_date()?,
        issue_ids: form.ids("issue_id")?,
    };
    let cover = form.take_file("cover");

    let volume = state
        .services
        .catalog
        .create_volume(&user.actor, new, cover)
        .await?;
    Ok((StatusCode::CREATED, Json(volume)))
}

/// A volume with its issues in order
pub async fn get_volume(
    State(state): State<AppState>,
    viewer: OptionalUser,
    ApiPath(volume_id): ApiPath<Uuid>,
) -> Result<Json<VolumeDetail>> {
    let volume = state.services.catalog.get_volume(viewer.actor(), volume_id).await?;
    Ok(Json(volume))
}

pub async fn delete_volume(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(volume_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    state.services.catalog.delete_volume(&user.actor, volume_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
