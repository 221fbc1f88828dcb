//! Paper comment handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser, OptionalUser};
use crate::AppState;
use minjok_common::{
    db::models::Comment,
    errors::Result,
    services::CommentThread,
};

#[derive(Debug, Default, Deserialize)]
pub struct CommentsQuery {
    /// Only comments left on this version
    pub version_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PostCommentRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,

    /// Top-level comment being answered
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditCommentRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

pub async fn list_comments(
    State(state): State<AppState>,
    viewer: OptionalUser,
    ApiPath(paper_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<CommentsQuery>,
) -> Result<Json<Vec<CommentThread>>> {
    let threads = state
        .services
        .comments
        .list(viewer.actor(), paper_id, query.version_id)
        .await?;
    Ok(Json(threads))
}

pub async fn post_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(paper_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<PostCommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    request.validate()?;

    let comment = state
        .services
        .comments
        .post(&user.actor, paper_id, &request.content, request.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(comment_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<EditCommentRequest>,
) -> Result<Json<Comment>> {
    request.validate()?;

    let comment = state
        .services
        .comments
        .edit(&user.actor, comment_id, &request.content)
        .await?;
    Ok(Json(comment))
}

/// Delete a comment and its replies
pub async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(comment_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    state.services.comments.delete(&user.actor, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
