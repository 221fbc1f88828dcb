//! Q&A handlers

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
    db::{
        models::{QnaQuestion, QnaReply},
        QuestionSummary,
    },
    errors::Result,
    pagination::Page,
    services::QuestionDetail,
};

#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 300))]
    pub title: String,

    #[validate(length(min = 1, max = 20000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 300))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 20000))]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplyRequest {
    #[validate(length(min = 1, max = 20000))]
    pub content: String,
}

/// Questions with their reply counts
pub async fn list_questions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Page<QuestionSummary>>> {
    let page = state
        .services
        .qna
        .list(query.query(), query.page, query.per_page)
        .await?;
    Ok(Json(page))
}

pub async fn get_question(
    State(state): State<AppState>,
    ApiPath(question_id): ApiPath<Uuid>,
) -> Result<Json<QuestionDetail>> {
    let question = state.services.qna.get(question_id).await?;
    Ok(Json(question))
}

pub async fn ask_question(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<AskRequest>,
) -> Result<(StatusCode, Json<QnaQuestion>)> {
    request.validate()?;

    let question = state
        .services
        .qna
        .ask(&user.actor, &request.title, &request.content)
        .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn update_question(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(question_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateQuestionRequest>,
) -> Result<Json<QnaQuestion>> {
    request.validate()?;

    let question = state
        .services
        .qna
        .update(&user.actor, question_id, request.title, request.content)
        .await?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(question_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    state.services.qna.delete(&user.actor, question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mentors and administrators only
pub async fn post_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(question_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ReplyRequest>,
) -> Result<(StatusCode, Json<QnaReply>)> {
    request.validate()?;

    let reply = state
        .services
        .qna
        .reply(&user.actor, question_id, &request.content)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(reply_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    state.services.qna.delete_reply(&user.actor, reply_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
