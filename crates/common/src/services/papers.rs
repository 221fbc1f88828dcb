//! Paper lifecycle
//!
//! Draft creation, metadata edits, the `draft -> in_review -> published`
//! state machine (plus unpublish), visibility and deletion.

use super::{optional_text, required_text, JournalSettings};
use crate::db::models::{Article, ArticleAuthor};
use crate::db::{NewArticle, Repository};
use crate::errors::{AppError, Result};
use crate::lifecycle::Transition;
use crate::metrics::record_transition;
use crate::pagination::Page;
use crate::policy::{require_mutate, Actor};
use crate::storage::ObjectStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A paper with its ordered co-authors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperDetail {
    #[serde(flatten)]
    pub article: Article,
    pub authors: Vec<ArticleAuthor>,
}

/// Published papers are public; drafts and papers under review are only
/// visible to their authors, co-authors and administrators.
pub(crate) async fn can_view(repo: &Repository, article: &Article, viewer: Option<&Actor>) -> Result<bool> {
    if article.is_published() {
        return Ok(true);
    }

    match viewer {
        None => Ok(false),
        Some(actor) if actor.id == article.author_id || actor.is_admin() => Ok(true),
        Some(actor) => repo.is_co_author(article.id, actor.id).await,
    }
}

pub(crate) async fn visible_article(repo: &Repository, viewer: Option<&Actor>, id: Uuid) -> Result<Article> {
    let article = repo
        .find_article(id)
        .await?
        .ok_or_else(|| AppError::not_found("Paper", id))?;

    if can_view(repo, &article, viewer).await? {
        Ok(article)
    } else {
        Err(AppError::not_found("Paper", id))
    }
}

#[derive(Clone)]
pub struct PaperService {
    repo: Repository,
    store: Arc<dyn ObjectStore>,
    settings: JournalSettings,
}

impl PaperService {
    pub fn new(repo: Repository, store: Arc<dyn ObjectStore>, settings: JournalSettings) -> Self {
        Self {
            repo,
            store,
            settings,
        }
    }

    async fn load(&self, id: Uuid) -> Result<Article> {
        self.repo
            .find_article(id)
            .await?
            .ok_or_else(|| AppError::not_found("Paper", id))
    }

    /// Load a paper the viewer may see; hidden papers read as missing
    pub async fn visible(&self, viewer: Option<&Actor>, id: Uuid) -> Result<Article> {
        visible_article(&self.repo, viewer, id).await
    }

    pub async fn create(
        &self,
        actor: &Actor,
        title: &str,
        description: Option<String>,
        co_author_ids: Vec<Uuid>,
    ) -> Result<PaperDetail> {
        let title = required_text(title, "title")?;
        let description = optional_text(description);

        let mut unique: Vec<Uuid> = Vec::with_capacity(co_author_ids.len());
        for id in co_author_ids {
            if id != actor.id && !unique.contains(&id) {
                unique.push(id);
            }
        }
        let co_author_ids = unique;

        if !co_author_ids.is_empty() {
            let found = self.repo.find_profiles(&co_author_ids).await?;
            if let Some(missing) = co_author_ids.iter().find(|id| !found.iter().any(|p| p.id == **id)) {
                return Err(AppError::validation(
                    "co_author_ids",
                    format!("Unknown co-author: {}", missing),
                ));
            }
        }

        let article = self
            .repo
            .create_article(NewArticle {
                title,
                description,
                author_id: actor.id,
                co_author_ids,
            })
            .await?;

        info!(paper_id = %article.id, author_id = %actor.id, "Paper created");

        let authors = self.repo.co_authors(article.id).await?;
        Ok(PaperDetail { article, authors })
    }

    pub async fn get(&self, viewer: Option<&Actor>, id: Uuid) -> Result<PaperDetail> {
        let article = self.visible(viewer, id).await?;
        let authors = self.repo.co_authors(id).await?;
        Ok(PaperDetail { article, authors })
    }

    pub async fn co_authors(&self, viewer: Option<&Actor>, id: Uuid) -> Result<Vec<ArticleAuthor>> {
        self.visible(viewer, id).await?;
        self.repo.co_authors(id).await
    }

    /// Edit title/description; the status is left alone
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        title: Option<String>,
        description: Option<String>,
    ) -> Result<Article> {
        let article = self.load(id).await?;
        require_mutate(actor, article.author_id, "paper")?;

        let title = title.map(|t| required_text(&t, "title")).transpose()?;
        let description = description.map(|d| optional_text(Some(d)));

        let updated = self
            .repo
            .update_article_details(id, title, description)
            .await?
            .ok_or_else(|| AppError::not_found("Paper", id))?;

        info!(paper_id = %id, actor_id = %actor.id, "Paper updated");
        Ok(updated)
    }

    pub async fn list_published(
        &self,
        query: Option<&str>,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> Result<Page<Article>> {
        let request = self.settings.page(page, per_page);
        let (articles, total) = self.repo.list_published_articles(query, request).await?;
        Ok(Page::new(articles, total, request))
    }

    /// The actor's papers in every status; administrators see all papers
    pub async fn list_own(
        &self,
        actor: &Actor,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> Result<Page<Article>> {
        let request = self.settings.page(page, per_page);
        let author = if actor.is_admin() { None } else { Some(actor.id) };
        let (articles, total) = self.repo.list_articles_by_author(author, request).await?;
        Ok(Page::new(articles, total, request))
    }

    /// `draft -> in_review`, by the author only
    pub async fn submit(&self, actor: &Actor, id: Uuid) -> Result<Article> {
        let article = self.load(id).await?;
        if actor.id != article.author_id {
            return Err(AppError::forbidden("Only the author may submit a paper for review"));
        }

        self.apply(actor, article, Transition::Submit, None).await
    }

    /// `in_review -> published`, finalizing the public title and description
    pub async fn publish(
        &self,
        actor: &Actor,
        id: Uuid,
        title: &str,
        description: Option<String>,
    ) -> Result<Article> {
        let title = required_text(title, "title")?;
        let description = optional_text(description);

        let article = self.load(id).await?;
        require_mutate(actor, article.author_id, "paper")?;

        self.apply(actor, article, Transition::Publish, Some((title, description)))
            .await
    }

    /// `published -> draft`, also accepted from `in_review`
    pub async fn unpublish(&self, actor: &Actor, id: Uuid) -> Result<Article> {
        let article = self.load(id).await?;
        require_mutate(actor, article.author_id, "paper")?;

        self.apply(actor, article, Transition::Unpublish, None).await
    }

    async fn apply(
        &self,
        actor: &Actor,
        article: Article,
        transition: Transition,
        metadata: Option<(String, Option<String>)>,
    ) -> Result<Article> {
        let from = article.status;
        let to = transition.apply(from)?;

        let updated = match self.repo.transition_article(article.id, from, to, metadata).await? {
            Some(updated) => updated,
            None => {
                // Someone else moved the paper first; report against its current status
                let current = self.load(article.id).await?;
                return Err(AppError::InvalidTransition {
                    from: current.status.to_string(),
                    action: transition.as_str().to_string(),
                });
            }
        };

        record_transition(transition.as_str());
        info!(
            paper_id = %article.id,
            actor_id = %actor.id,
            from = %from,
            to = %to,
            "Paper status changed"
        );
        Ok(updated)
    }

    /// Delete the paper and everything hanging off it, then its stored files
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let article = self.load(id).await?;
        require_mutate(actor, article.author_id, "paper")?;

        let paths: Vec<String> = self
            .repo
            .list_versions(id)
            .await?
            .into_iter()
            .map(|v| v.storage_path)
            .collect();

        if !self.repo.delete_article(id).await? {
            return Err(AppError::not_found("Paper", id));
        }

        if let Err(e) = self.store.remove(&paths).await {
            warn!(paper_id = %id, files = paths.len(), error = %e, "Failed to remove paper files");
        }

        info!(paper_id = %id, actor_id = %actor.id, files = paths.len(), "Paper deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::{ArticleStatus, Role};
    use crate::errors::AppError;
    use crate::services::testing::{pdf, TestJournal};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_create_records_co_authors_in_order() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let first = journal.actor(Role::Mentor).await;
        let second = journal.actor(Role::Mentee).await;

        let detail = journal
            .services
            .papers
            .create(&author, " Draft title ", None, vec![first.id, second.id, author.id])
            .await
            .unwrap();

        assert_eq!(detail.article.title, "Draft title");
        assert_eq!(detail.article.status, ArticleStatus::Draft);
        let ids: Vec<_> = detail.authors.iter().map(|a| a.profile_id).collect();
        assert_eq!(ids, vec![author.id, first.id, second.id]);
        assert!(detail.authors[0].is_corresponding);
        assert!(!detail.authors[1].is_corresponding);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_co_author_and_blank_title() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let papers = &journal.services.papers;

        let err = papers
            .create(&author, "T", None, vec![uuid::Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        assert_err!(papers.create(&author, "  ", None, vec![]).await);
    }

    #[tokio::test]
    async fn test_full_lifecycle_scenario() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let reader = journal.actor(Role::Mentee).await;
        let admin = journal.admin().await;
        let s = &journal.services;

        let paper = s.papers.create(&author, "Working title", None, vec![]).await.unwrap().article;

        let v1 = s.versions.upload(&author, paper.id, Some(pdf("x.pdf")), None).await.unwrap();
        assert_eq!(v1.version_number, 1);
        let stored = journal.repo.find_article(paper.id).await.unwrap().unwrap();
        assert_eq!(stored.current_version_id, Some(v1.id));

        let submitted = s.papers.submit(&author, paper.id).await.unwrap();
        assert_eq!(submitted.status, ArticleStatus::InReview);

        let published = s
            .papers
            .publish(&author, paper.id, "Final", Some("Abstract".to_string()))
            .await
            .unwrap();
        assert_eq!(published.status, ArticleStatus::Published);
        assert_eq!(published.title, "Final");
        assert_eq!(published.description.as_deref(), Some("Abstract"));

        let comment = s
            .comments
            .post(&reader, paper.id, "nice work", None)
            .await
            .unwrap();
        assert_eq!(comment.version_id, v1.id);

        let unpublished = s.papers.unpublish(&admin, paper.id).await.unwrap();
        assert_eq!(unpublished.status, ArticleStatus::Draft);

        let threads = s.comments.list(Some(&admin), paper.id, None).await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.content, "nice work");

        let err = s.comments.post(&reader, paper.id, "more", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotPublished { .. }));
    }

    #[tokio::test]
    async fn test_invalid_transitions_leave_paper_untouched() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let papers = &journal.services.papers;
        let paper = papers.create(&author, "T", None, vec![]).await.unwrap().article;

        // draft cannot be published or unpublished directly
        let err = papers.publish(&author, paper.id, "Final", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_err!(papers.unpublish(&author, paper.id).await);

        papers.submit(&author, paper.id).await.unwrap();
        assert_err!(papers.submit(&author, paper.id).await);

        papers.publish(&author, paper.id, "Final", None).await.unwrap();
        let err = papers.publish(&author, paper.id, "Again", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        let stored = journal.repo.find_article(paper.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ArticleStatus::Published);
        assert_eq!(stored.title, "Final");
    }

    #[tokio::test]
    async fn test_unpublish_from_review_is_allowed() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let papers = &journal.services.papers;
        let paper = papers.create(&author, "T", None, vec![]).await.unwrap().article;

        papers.submit(&author, paper.id).await.unwrap();
        let back = papers.unpublish(&author, paper.id).await.unwrap();
        assert_eq!(back.status, ArticleStatus::Draft);
    }

    #[tokio::test]
    async fn test_only_author_or_admin_may_mutate() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let stranger = journal.actor(Role::Mentor).await;
        let admin = journal.admin().await;
        let papers = &journal.services.papers;
        let paper = papers.create(&author, "T", None, vec![]).await.unwrap().article;

        let err = papers
            .update(&stranger, paper.id, Some("Hijack".to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        // submitting is reserved for the author, even for administrators
        assert_err!(papers.submit(&admin, paper.id).await);
        assert_err!(papers.submit(&stranger, paper.id).await);
        papers.submit(&author, paper.id).await.unwrap();

        let err = papers.publish(&stranger, paper.id, "X", None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        assert_ok!(papers.publish(&admin, paper.id, "By admin", None).await);

        assert_err!(papers.delete(&stranger, paper.id).await);
        let stored = journal.repo.find_article(paper.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "By admin");
    }

    #[tokio::test]
    async fn test_visibility() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let co_author = journal.actor(Role::Mentee).await;
        let stranger = journal.actor(Role::Mentor).await;
        let papers = &journal.services.papers;
        let paper = papers
            .create(&author, "Hidden", None, vec![co_author.id])
            .await
            .unwrap()
            .article;

        assert_ok!(papers.get(Some(&author), paper.id).await);
        assert_ok!(papers.get(Some(&co_author), paper.id).await);
        let err = papers.get(Some(&stranger), paper.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        assert_err!(papers.get(None, paper.id).await);

        papers.submit(&author, paper.id).await.unwrap();
        papers.publish(&author, paper.id, "Visible", None).await.unwrap();
        assert_ok!(papers.get(None, paper.id).await);
    }

    #[tokio::test]
    async fn test_list_published_search_and_own() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let other = journal.actor(Role::Prof).await;
        let admin = journal.admin().await;
        let papers = &journal.services.papers;

        for title in ["Rust Ownership", "Memory Models", "rusty tools"] {
            let p = papers.create(&author, title, None, vec![]).await.unwrap().article;
            papers.submit(&author, p.id).await.unwrap();
            papers.publish(&author, p.id, title, None).await.unwrap();
        }
        papers.create(&author, "Rust draft", None, vec![]).await.unwrap();
        papers.create(&other, "Other draft", None, vec![]).await.unwrap();

        let all = papers.list_published(None, None, None).await.unwrap();
        assert_eq!(all.total, 3);

        let rust = papers.list_published(Some("RUST"), Some(1), Some(10)).await.unwrap();
        assert_eq!(rust.total, 2);
        assert!(rust.items.iter().all(|a| a.is_published()));

        let paged = papers.list_published(None, Some(2), Some(2)).await.unwrap();
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.total_pages, 2);

        assert_eq!(papers.list_own(&author, None, None).await.unwrap().total, 4);
        assert_eq!(papers.list_own(&other, None, None).await.unwrap().total, 1);
        assert_eq!(papers.list_own(&admin, None, None).await.unwrap().total, 5);
    }

    #[tokio::test]
    async fn test_delete_removes_rows_and_files() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let s = &journal.services;
        let paper = s.papers.create(&author, "T", None, vec![]).await.unwrap().article;

        s.versions.upload(&author, paper.id, Some(pdf("a.pdf")), None).await.unwrap();
        s.versions.upload(&author, paper.id, Some(pdf("b.pdf")), None).await.unwrap();
        assert_eq!(journal.store.paths().await.len(), 2);

        s.papers.delete(&author, paper.id).await.unwrap();

        assert!(journal.repo.find_article(paper.id).await.unwrap().is_none());
        assert!(journal.repo.list_versions(paper.id).await.unwrap().is_empty());
        assert!(journal.store.paths().await.is_empty());
    }
}
