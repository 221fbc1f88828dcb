//! Paper comments
//!
//! Comments are only accepted on published papers and are pinned to the
//! paper's current version at posting time. Threads are one level deep.

use super::papers::visible_article;
use super::required_text;
use crate::db::models::Comment;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::metrics::record_comment;
use crate::policy::{require_mutate, Actor};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// A top-level comment and its replies, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

/// Group a flat, oldest-first list into threads
pub fn into_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
    let (top, replies): (Vec<Comment>, Vec<Comment>) =
        comments.into_iter().partition(|c| c.parent_id.is_none());

    let mut threads: Vec<CommentThread> = top
        .into_iter()
        .map(|comment| CommentThread {
            comment,
            replies: Vec::new(),
        })
        .collect();

    for reply in replies {
        if let Some(thread) = threads
            .iter_mut()
            .find(|t| Some(t.comment.id) == reply.parent_id)
        {
            thread.replies.push(reply);
        }
    }

    threads
}

#[derive(Clone)]
pub struct CommentService {
    repo: Repository,
}

impl CommentService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    async fn load(&self, id: Uuid) -> Result<Comment> {
        self.repo
            .find_comment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment", id))
    }

    /// Post a comment or a reply to a top-level comment
    pub async fn post(
        &self,
        actor: &Actor,
        article_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Comment> {
        let content = required_text(content, "content")?;

        let article = self
            .repo
            .find_article(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Paper", article_id))?;

        if !article.is_published() {
            return Err(AppError::NotPublished {
                id: article_id.to_string(),
            });
        }

        let version_id = article.current_version_id.ok_or_else(|| {
            AppError::validation("version", "This paper has no uploaded version to comment on")
        })?;

        if let Some(parent_id) = parent_id {
            let parent = self.load(parent_id).await?;
            if parent.article_id != article_id {
                return Err(AppError::validation(
                    "parent_id",
                    "Replies must stay on the same paper",
                ));
            }
            if parent.parent_id.is_some() {
                return Err(AppError::validation(
                    "parent_id",
                    "Replies can only answer a top-level comment",
                ));
            }
        }

        let comment = self
            .repo
            .insert_comment(article_id, version_id, actor.id, content, parent_id)
            .await?;

        record_comment("paper");
        info!(
            comment_id = %comment.id,
            paper_id = %article_id,
            version_id = %version_id,
            author_id = %actor.id,
            "Comment posted"
        );
        Ok(comment)
    }

    /// Threads on a paper the viewer may see, optionally for one version
    pub async fn list(
        &self,
        viewer: Option<&Actor>,
        article_id: Uuid,
        version_id: Option<Uuid>,
    ) -> Result<Vec<CommentThread>> {
        visible_article(&self.repo, viewer, article_id).await?;
        let comments = self.repo.list_comments(article_id, version_id).await?;
        Ok(into_threads(comments))
    }

    pub async fn edit(&self, actor: &Actor, id: Uuid, content: &str) -> Result<Comment> {
        let content = required_text(content, "content")?;
        let comment = self.load(id).await?;
        require_mutate(actor, comment.author_id, "comment")?;

        let updated = self.repo.update_comment(comment, content).await?;
        info!(comment_id = %id, actor_id = %actor.id, "Comment edited");
        Ok(updated)
    }

    /// Delete a comment; replies go with it
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let comment = self.load(id).await?;
        require_mutate(actor, comment.author_id, "comment")?;

        let removed = self.repo.delete_comment_thread(id).await?;
        info!(comment_id = %id, actor_id = %actor.id, removed, "Comment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::{Article, Role};
    use crate::errors::AppError;
    use crate::policy::Actor;
    use crate::services::testing::{pdf, TestJournal};
    use tokio_test::{assert_err, assert_ok};

    async fn published(journal: &TestJournal, author: &Actor) -> Article {
        let s = &journal.services;
        let paper = s.papers.create(author, "T", None, vec![]).await.unwrap().article;
        s.versions.upload(author, paper.id, Some(pdf("x.pdf")), None).await.unwrap();
        s.papers.submit(author, paper.id).await.unwrap();
        s.papers.publish(author, paper.id, "Final", None).await.unwrap()
    }

    #[tokio::test]
    async fn test_comments_require_published_paper() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let reader = journal.actor(Role::Mentee).await;
        let s = &journal.services;

        let draft = s.papers.create(&author, "Draft", None, vec![]).await.unwrap().article;
        s.versions.upload(&author, draft.id, Some(pdf("x.pdf")), None).await.unwrap();

        let err = s.comments.post(&reader, draft.id, "hello", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotPublished { .. }));
        assert!(journal.repo.list_comments(draft.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_pins_current_version() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let reader = journal.actor(Role::Mentee).await;
        let s = &journal.services;
        let paper = published(&journal, &author).await;

        let first = s.comments.post(&reader, paper.id, "on v1", None).await.unwrap();
        let v2 = s.versions.upload(&author, paper.id, Some(pdf("y.pdf")), None).await.unwrap();
        let second = s.comments.post(&reader, paper.id, "on v2", None).await.unwrap();

        assert_ne!(first.version_id, second.version_id);
        assert_eq!(second.version_id, v2.id);

        let only_v2 = s.comments.list(None, paper.id, Some(v2.id)).await.unwrap();
        assert_eq!(only_v2.len(), 1);
        assert_eq!(only_v2[0].comment.content, "on v2");
    }

    #[tokio::test]
    async fn test_threads_are_one_level_deep() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let reader = journal.actor(Role::Mentee).await;
        let s = &journal.services;
        let paper = published(&journal, &author).await;

        let top = s.comments.post(&reader, paper.id, "question", None).await.unwrap();
        let reply = s
            .comments
            .post(&author, paper.id, "answer", Some(top.id))
            .await
            .unwrap();

        let err = s
            .comments
            .post(&reader, paper.id, "nested", Some(reply.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let other = published(&journal, &author).await;
        assert_err!(s.comments.post(&reader, other.id, "cross", Some(top.id)).await);

        let threads = s.comments.list(None, paper.id, None).await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(threads[0].replies[0].id, reply.id);
    }

    #[tokio::test]
    async fn test_edit_and_delete_permissions() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let reader = journal.actor(Role::Mentee).await;
        let stranger = journal.actor(Role::Mentor).await;
        let admin = journal.admin().await;
        let s = &journal.services;
        let paper = published(&journal, &author).await;

        let top = s.comments.post(&reader, paper.id, "first", None).await.unwrap();
        s.comments.post(&author, paper.id, "reply", Some(top.id)).await.unwrap();

        let err = s.comments.edit(&stranger, top.id, "changed").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        assert_err!(s.comments.delete(&stranger, top.id).await);

        let edited = s.comments.edit(&reader, top.id, "edited").await.unwrap();
        assert_eq!(edited.content, "edited");

        assert_ok!(s.comments.delete(&admin, top.id).await);
        assert!(journal.repo.list_comments(paper.id, None).await.unwrap().is_empty());
    }
}
