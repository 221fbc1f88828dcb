//! Issue catalog handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::FormData;
use crate::extract::{ApiJson, ApiPath, CurrentUser, OptionalUser};
use crate::AppState;
use minjok_common::{
    db::models::{Article, Issue},
    errors::Result,
    services::{IssueDetail, NewIssue},
};

#[derive(Debug, Default, Deserialize)]
pub struct ReleaseRequest {
    /// Defaults to the planned date, then today
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
}

/// Released issues; administrators also see drafts
pub async fn list_issues(
    State(state): State<AppState>,
    viewer: OptionalUser,
) -> Result<Json<Vec<Issue>>> {
    let issues = state.services.catalog.list_issues(viewer.actor()).await?;
    Ok(Json(issues))
}

/// Published papers not yet placed in an issue
pub async fn available_papers(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Article>>> {
    let papers = state.services.catalog.available_articles(&user.actor).await?;
    Ok(Json(papers))
}

/// Create an issue (multipart: `title`, `description`, `status`,
/// `release_date`, repeated `article_id`, `cover`)
pub async fn create_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    mut form: FormData,
) -> Result<(StatusCode, Json<Issue>)> {

    let new = NewIssue {
        title: form.text("title").unwrap_or_default(),
        description: form.text("description"),
        status: form.status()?,
        release_date: form.release_date()?,
        article_ids: form.ids("article_id")?,
    };
    let cover = form.take_file("cover");

    let issue = state
        .services
        .catalog
        .create_issue(&user.actor, new, cover)
        .await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

/// An issue with its papers in order
pub async fn get_issue(
    State(state): State<AppState>,
    viewer: OptionalUser,
    ApiPath(issue_id): ApiPath<Uuid>,
) -> Result<Json<IssueDetail>> {
    let issue = state.services.catalog.get_issue(viewer.actor(), issue_id).await?;
    Ok(Json(issue))
}

pub async fn release_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(issue_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ReleaseRequest>,
) -> Result<Json<Issue>> {
    let issue = state
        .services
        .catalog
        .release_issue(&user.actor, issue_id, request.release_date)
        .await?;
    Ok(Json(issue))
}

pub async fn delete_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(issue_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    state.services.catalog.delete_issue(&user.actor, issue_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
