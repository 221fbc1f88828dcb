//! Version upload handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::FormData;
use crate::extract::{ApiPath, CurrentUser, OptionalUser};
use crate::AppState;
use minjok_common::{db::models::ArticleVersion, errors::Result};

/// A stored version plus the URL its file is served from
#[derive(Serialize)]
pub struct VersionResponse {
    #[serde(flatten)]
    pub version: ArticleVersion,
    pub file_url: String,
}

fn respond(state: &AppState, version: ArticleVersion) -> VersionResponse {
    VersionResponse {
        file_url: state.services.versions.file_url(&version),
        version,
    }
}

/// Versions of a paper, newest first
pub async fn list_versions(
    State(state): State<AppState>,
    viewer: OptionalUser,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<Json<Vec<VersionResponse>>> {
    let versions = state.services.versions.list(viewer.actor(), paper_id).await?;
    Ok(Json(
        versions
            .into_iter()
            .map(|v| respond(&state, v))
            .collect(),
    ))
}

/// Upload a new version (multipart: `file`, optional `notes`)
pub async fn upload_version(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(paper_id): ApiPath<Uuid>,
    mut form: FormData,
) -> Result<(StatusCode, Json<VersionResponse>)> {
    let file = form.take_file("file");
    let notes = form.text("notes");

    let version = state
        .services
        .versions
        .upload(&user.actor, paper_id, file, notes)
        .await?;

    Ok((StatusCode::CREATED, Json(respond(&state, version))))
}
