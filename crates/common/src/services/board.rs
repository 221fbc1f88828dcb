//! Community board
//!
//! Announcements written by administrators, open for comments from anyone
//! signed in.

use super::{required_text, JournalSettings};
use crate::db::models::{BoardComment, BoardPost};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::metrics::record_comment;
use crate::pagination::Page;
use crate::policy::{require_catalog, require_mutate, Actor};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardPostDetail {
    #[serde(flatten)]
    pub post: BoardPost,
    pub comments: Vec<BoardComment>,
}

#[derive(Clone)]
pub struct BoardService {
    repo: Repository,
    settings: JournalSettings,
}

impl BoardService {
    pub fn new(repo: Repository, settings: JournalSettings) -> Self {
        Self { repo, settings }
    }

    async fn load(&self, id: Uuid) -> Result<BoardPost> {
        self.repo
            .find_board_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("Board post", id))
    }

    pub async fn create_post(&self, actor: &Actor, title: &str, content: &str) -> Result<BoardPost> {
        require_catalog(actor)?;
        let title = required_text(title, "title")?;
        let content = required_text(content, "content")?;

        let post = self.repo.insert_board_post(actor.id, title, content).await?;
        info!(post_id = %post.id, author_id = %actor.id, "Board post created");
        Ok(post)
    }

    pub async fn update_post(
        &self,
        actor: &Actor,
        id: Uuid,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<BoardPost> {
        let post = self.load(id).await?;
        require_mutate(actor, post.author_id, "post")?;

        let title = title.map(|t| required_text(&t, "title")).transpose()?;
        let content = content.map(|c| required_text(&c, "content")).transpose()?;

        let updated = self.repo.update_board_post(post, title, content).await?;
        info!(post_id = %id, actor_id = %actor.id, "Board post updated");
        Ok(updated)
    }

    pub async fn delete_post(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let post = self.load(id).await?;
        require_mutate(actor, post.author_id, "post")?;

        self.repo.delete_board_post(id).await?;
        info!(post_id = %id, actor_id = %actor.id, "Board post deleted");
        Ok(())
    }

    pub async fn list_posts(
        &self,
        query: Option<&str>,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> Result<Page<BoardPost>> {
        let request = self.settings.page(page, per_page);
        let (posts, total) = self.repo.list_board_posts(query, request).await?;
        Ok(Page::new(posts, total, request))
    }

    pub async fn get_post(&self, id: Uuid) -> Result<BoardPostDetail> {
        let post = self.load(id).await?;
        let comments = self.repo.list_board_comments(id).await?;
        Ok(BoardPostDetail { post, comments })
    }

    /// Any signed-in user; board posts have no status gate
    pub async fn post_comment(&self, actor: &Actor, post_id: Uuid, content: &str) -> Result<BoardComment> {
        let content = required_text(content, "content")?;
        self.load(post_id).await?;

        let comment = self.repo.insert_board_comment(post_id, actor.id, content).await?;
        record_comment("board");
        info!(comment_id = %comment.id, post_id = %post_id, author_id = %actor.id, "Board comment posted");
        Ok(comment)
    }

    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<BoardComment>> {
        self.load(post_id).await?;
        self.repo.list_board_comments(post_id).await
    }

    pub async fn delete_comment(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let comment = self
            .repo
            .find_board_comment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Board comment", id))?;
        require_mutate(actor, comment.author_id, "comment")?;

        self.repo.delete_board_comment(id).await?;
        info!(comment_id = %id, actor_id = %actor.id, "Board comment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::{AdminType, Role};
    use crate::errors::AppError;
    use crate::policy::Actor;
    use crate::services::testing::TestJournal;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_either_admin_signal_may_create_posts() {
        let journal = TestJournal::new().await;
        let role_admin = Actor::from(&journal.profile(Role::Admin, AdminType::User).await);
        let flag_admin = Actor::from(&journal.profile(Role::Prof, AdminType::Admin).await);
        let mentor = journal.actor(Role::Mentor).await;
        let board = &journal.services.board;

        assert_ok!(board.create_post(&role_admin, "Notice", "Body").await);
        assert_ok!(board.create_post(&flag_admin, "Notice 2", "Body").await);

        let err = board.create_post(&mentor, "Nope", "Body").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        assert_eq!(board.list_posts(None, None, None).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_comments_and_cascade() {
        let journal = TestJournal::new().await;
        let admin = journal.admin().await;
        let mentee = journal.actor(Role::Mentee).await;
        let stranger = journal.actor(Role::Mentor).await;
        let board = &journal.services.board;

        let post = board.create_post(&admin, "Welcome", "Hello all").await.unwrap();
        let comment = board.post_comment(&mentee, post.id, "Thanks!").await.unwrap();
        assert_err!(board.post_comment(&mentee, post.id, "  ").await);

        let detail = board.get_post(post.id).await.unwrap();
        assert_eq!(detail.comments.len(), 1);

        let err = board.delete_comment(&stranger, comment.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        board.post_comment(&stranger, post.id, "Second").await.unwrap();
        assert_eq!(board.list_comments(post.id).await.unwrap().len(), 2);

        assert_err!(board.delete_post(&mentee, post.id).await);
        board.delete_post(&admin, post.id).await.unwrap();
        assert!(journal.repo.list_board_comments(post.id).await.unwrap().is_empty());
        assert_err!(board.get_post(post.id).await);
    }

    #[tokio::test]
    async fn test_update_and_search() {
        let journal = TestJournal::new().await;
        let admin = journal.admin().await;
        let other_admin = journal.admin().await;
        let board = &journal.services.board;

        let post = board.create_post(&admin, "Spring schedule", "TBD").await.unwrap();
        board.create_post(&admin, "Fall meetup", "TBD").await.unwrap();

        let updated = board
            .update_post(&other_admin, post.id, None, Some("Final dates".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.title, "Spring schedule");
        assert_eq!(updated.content, "Final dates");

        let mentor = journal.actor(Role::Mentor).await;
        let err = board
            .update_post(&mentor, post.id, Some("Hijacked".to_string()), Some("Gone".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let unchanged = board.get_post(post.id).await.unwrap().post;
        assert_eq!(unchanged.title, "Spring schedule");
        assert_eq!(unchanged.content, "Final dates");

        let found = board.list_posts(Some("spring"), None, None).await.unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].id, post.id);
    }
}
