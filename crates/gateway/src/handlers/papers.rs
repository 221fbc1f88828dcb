//! Paper management handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::ListQuery;
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser, OptionalUser};
use crate::AppState;
use minjok_common::{
    db::models::{Article, ArticleAuthor},
    errors::Result,
    pagination::Page,
    services::PaperDetail,
};

/// Request to create a new paper
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaperRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[serde(default)]
    pub co_author_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePaperRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// Final public metadata set when publishing
#[derive(Debug, Deserialize, Validate)]
pub struct PublishRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// Public listing of published papers
pub async fn list_published(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Page<Article>>> {
    let page = state
        .services
        .papers
        .list_published(query.query(), query.page, query.per_page)
        .await?;
    Ok(Json(page))
}

/// The caller's own papers in every status
pub async fn list_own(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Page<Article>>> {
    let page = state
        .services
        .papers
        .list_own(&user.actor, query.page, query.per_page)
        .await?;
    Ok(Json(page))
}

/// Create a new draft paper
pub async fn create_paper(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreatePaperRequest>,
) -> Result<(StatusCode, Json<PaperDetail>)> {
    request.validate()?;

    let paper = state
        .services
        .papers
        .create(&user.actor, &request.title, request.description, request.co_author_ids)
        .await?;

    Ok((StatusCode::CREATED, Json(paper)))
}

/// Get a paper by ID
pub async fn get_paper(
    State(state): State<AppState>,
    viewer: OptionalUser,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<Json<PaperDetail>> {
    let paper = state.services.papers.get(viewer.actor(), paper_id).await?;
    Ok(Json(paper))
}

pub async fn co_authors(
    State(state): State<AppState>,
    viewer: OptionalUser,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<Json<Vec<ArticleAuthor>>> {
    let authors = state.services.papers.co_authors(viewer.actor(), paper_id).await?;
    Ok(Json(authors))
}

pub async fn update_paper(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(paper_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdatePaperRequest>,
) -> Result<Json<Article>> {
    request.validate()?;

    let paper = state
        .services
        .papers
        .update(&user.actor, paper_id, request.title, request.description)
        .await?;
    Ok(Json(paper))
}

/// Delete a paper with its versions, comments and files
pub async fn delete_paper(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    state.services.papers.delete(&user.actor, paper_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_paper(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<Json<Article>> {
    let paper = state.services.papers.submit(&user.actor, paper_id).await?;
    Ok(Json(paper))
}

pub async fn publish_paper(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(paper_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<PublishRequest>,
) -> Result<Json<Article>> {
    request.validate()?;

    let paper = state
        .services
        .papers
        .publish(&user.actor, paper_id, &request.title, request.description)
        .await?;
    Ok(Json(paper))
}

pub async fn unpublish_paper(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(paper_id): ApiPath<Uuid>,
) -> Result<Json<Article>> {
    let paper = state.services.papers.unpublish(&user.actor, paper_id).await?;
    Ok(Json(paper))
}
