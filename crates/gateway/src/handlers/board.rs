//! Community board handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::ListQuery;
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::AppState;
use minjok_common::{
    db::models::{BoardComment, BoardPost},
    errors::Result,
    pagination::Page,
    services::BoardPostDetail,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 300))]
    pub title: String,

    #[validate(length(min = 1, max = 20000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 300))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 20000))]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BoardCommentRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

pub async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Page<BoardPost>>> {
    let page = state
        .services
        .board
        .list_posts(query.query(), query.page, query.per_page)
        .await?;
    Ok(Json(page))
}

pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<Json<BoardPostDetail>> {
    let post = state.services.board.get_post(post_id).await?;
    Ok(Json(post))
}

/// Administrators only
pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<BoardPost>)> {
    request.validate()?;

    let post = state
        .services
        .board
        .create_post(&user.actor, &request.title, &request.content)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdatePostRequest>,
) -> Result<Json<BoardPost>> {
    request.validate()?;

    let post = state
        .services
        .board
        .update_post(&user.actor, post_id, request.title, request.content)
        .await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    state.services.board.delete_post(&user.actor, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<Json<Vec<BoardComment>>> {
    let comments = state.services.board.list_comments(post_id).await?;
    Ok(Json(comments))
}

pub async fn post_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<BoardCommentRequest>,
) -> Result<(StatusCode, Json<BoardComment>)> {
    request.validate()?;

    let comment = state
        .services
        .board
        .post_comment(&user.actor, post_id, &request.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(comment_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    state.services.board.delete_comment(&user.actor, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
