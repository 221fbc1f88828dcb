//! Q&A: questions from anyone signed in, replies from mentors and admins

use super::{required_text, JournalSettings};
use crate::db::models::{QnaQuestion, QnaReply};
use crate::db::{QuestionSummary, Repository};
use crate::errors::{AppError, Result};
use crate::pagination::Page;
use crate::policy::{require_mutate, require_reply, Actor};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: QnaQuestion,
    pub replies: Vec<QnaReply>,
}

#[derive(Clone)]
pub struct QnaService {
    repo: Repository,
    settings: JournalSettings,
}

impl QnaService {
    pub fn new(repo: Repository, settings: JournalSettings) -> Self {
        Self { repo, settings }
    }

    async fn load(&self, id: Uuid) -> Result<QnaQuestion> {
        self.repo
            .find_question(id)
            .await?
            .ok_or_else(|| AppError::not_found("Question", id))
    }

    pub async fn ask(&self, actor: &Actor, title: &str, content: &str) -> Result<QnaQuestion> {
        let title = required_text(title, "title")?;
        let content = required_text(content, "content")?;

        let question = self.repo.insert_question(actor.id, title, content).await?;
        info!(question_id = %question.id, author_id = %actor.id, "Question asked");
        Ok(question)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<QnaQuestion> {
        let question = self.load(id).await?;
        require_mutate(actor, question.author_id, "question")?;

        let title = title.map(|t| required_text(&t, "title")).transpose()?;
        let content = content.map(|c| required_text(&c, "content")).transpose()?;

        let updated = self.repo.update_question(question, title, content).await?;
        info!(question_id = %id, actor_id = %actor.id, "Question updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let question = self.load(id).await?;
        require_mutate(actor, question.author_id, "question")?;

        self.repo.delete_question(id).await?;
        info!(question_id = %id, actor_id = %actor.id, "Question deleted");
        Ok(())
    }

    pub async fn list(
        &self,
        query: Option<&str>,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> Result<Page<QuestionSummary>> {
        let request = self.settings.page(page, per_page);
        let (questions, total) = self.repo.list_questions(query, request).await?;
        Ok(Page::new(questions, total, request))
    }

    pub async fn get(&self, id: Uuid) -> Result<QuestionDetail> {
        let question = self.load(id).await?;
        let replies = self.repo.list_replies(id).await?;
        Ok(QuestionDetail { question, replies })
    }

    /// Mentors and administrators only
    pub async fn reply(&self, actor: &Actor, question_id: Uuid, content: &str) -> Result<QnaReply> {
        require_reply(actor)?;
        let content = required_text(content, "content")?;
        self.load(question_id).await?;

        let reply = self.repo.insert_reply(question_id, actor.id, content).await?;
        info!(reply_id = %reply.id, question_id = %question_id, author_id = %actor.id, "Reply posted");
        Ok(reply)
    }

    pub async fn delete_reply(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let reply = self
            .repo
            .find_reply(id)
            .await?
            .ok_or_else(|| AppError::not_found("Reply", id))?;
        require_mutate(actor, reply.author_id, "reply")?;

        self.repo.delete_reply(id).await?;
        info!(reply_id = %id, actor_id = %actor.id, "Reply deleted");
        Ok(())
    }
}
