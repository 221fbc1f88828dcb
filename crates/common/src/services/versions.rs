//! Version upload
//!
//! One upload is one transaction: read the newest version, enforce the
//! per-paper cooldown, claim the next number (unique per paper), store the
//! file, move the paper's current-version pointer, commit. A lost race on the
//! number is retried with exponential backoff; the file is removed again if
//! the commit fails.

use super::papers::visible_article;
use super::{optional_text, FileUpload, JournalSettings};
use crate::db::models::ArticleVersion;
use crate::db::{NewVersion, Repository};
use crate::errors::{AppError, Result};
use crate::lifecycle::check_cooldown;
use crate::metrics::{record_upload_throttled, record_version_uploaded};
use crate::policy::{can_mutate, Actor};
use crate::storage::{version_path, ObjectStore};
use backoff::ExponentialBackoffBuilder;
use chrono::Utc;
use sea_orm::{DatabaseTransaction, TransactionTrait};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct VersionService {
    repo: Repository,
    store: Arc<dyn ObjectStore>,
    settings: JournalSettings,
}

impl VersionService {
    pub fn new(repo: Repository, store: Arc<dyn ObjectStore>, settings: JournalSettings) -> Self {
        Self {
            repo,
            store,
            settings,
        }
    }

    /// Versions of a paper the viewer may see, newest first
    pub async fn list(&self, viewer: Option<&Actor>, article_id: Uuid) -> Result<Vec<ArticleVersion>> {
        visible_article(&self.repo, viewer, article_id).await?;
        self.repo.list_versions(article_id).await
    }

    /// Upload a new version of a paper.
    ///
    /// Allowed for the author, co-authors and administrators.
    pub async fn upload(
        &self,
        actor: &Actor,
        article_id: Uuid,
        file: Option<FileUpload>,
        notes: Option<String>,
    ) -> Result<ArticleVersion> {
        let article = self
            .repo
            .find_article(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Paper", article_id))?;

        if !can_mutate(actor.id, actor.is_admin(), article.author_id)
            && !self.repo.is_co_author(article_id, actor.id).await?
        {
            return Err(AppError::forbidden(
                "Only the paper's authors or an administrator may upload versions",
            ));
        }

        let file = FileUpload::require(file, "file")?;
        let notes = optional_text(notes);

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(20))
            .with_max_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(Duration::from_secs(2)))
            .build();

        let file = &file;
        let notes = notes.as_deref();
        let version = backoff::future::retry(policy, || async move {
            match self.attempt(actor, article_id, file, notes).await {
                Ok(version) => Ok(version),
                Err(e @ AppError::Conflict { .. }) => {
                    warn!(paper_id = %article_id, error = %e, "Version number taken, retrying");
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await?;

        record_version_uploaded();
        info!(
            paper_id = %article_id,
            version_id = %version.id,
            version_number = version.version_number,
            actor_id = %actor.id,
            "Version uploaded"
        );
        Ok(version)
    }

    async fn attempt(
        &self,
        actor: &Actor,
        article_id: Uuid,
        file: &FileUpload,
        notes: Option<&str>,
    ) -> Result<ArticleVersion> {
        let txn = self.repo.begin().await?;

        let version = match self.write_version(&txn, actor, article_id, file, notes).await {
            Ok(version) => version,
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(paper_id = %article_id, error = %rollback, "Rollback failed");
                }
                return Err(e);
            }
        };

        if let Err(e) = txn.commit().await {
            let paths = vec![version.storage_path.clone()];
            if let Err(cleanup) = self.store.remove(&paths).await {
                warn!(path = %version.storage_path, error = %cleanup, "Failed to remove orphaned upload");
            }
            return Err(e.into());
        }

        Ok(version)
    }

    async fn write_version(
        &self,
        txn: &DatabaseTransaction,
        actor: &Actor,
        article_id: Uuid,
        file: &FileUpload,
        notes: Option<&str>,
    ) -> Result<ArticleVersion> {
        let latest = Repository::latest_version_in(txn, article_id).await?;

        let last_upload = latest.as_ref().map(|v| v.created_at.with_timezone(&Utc));
        if let Err(e) = check_cooldown(last_upload, Utc::now(), self.settings.version_cooldown) {
            record_upload_throttled();
            return Err(e);
        }

        let next = latest.map(|v| v.version_number + 1).unwrap_or(1);
        let storage_path = version_path(actor.id, article_id, next, &file.file_name);

        // The row goes in first so a concurrent upload loses on the unique
        // index before it writes a file at the same path
        let version = Repository::insert_version_in(
            txn,
            NewVersion {
                article_id,
                version_number: next,
                storage_path: storage_path.clone(),
                file_name: file.file_name.clone(),
                file_size: Some(file.data.len() as i64),
                notes: notes.map(String::from),
                uploaded_by: actor.id,
            },
        )
        .await?;

        Repository::set_current_version_in(txn, article_id, version.id).await?;

        self.store
            .upload(&storage_path, file.data.clone(), &file.content_type)
            .await?;

        Ok(version)
    }

    /// Public URL of a stored version
    pub fn file_url(&self, version: &ArticleVersion) -> String {
        self.store.public_url(&version.storage_path)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::Role;
    use crate::db::{NewVersion, Repository};
    use crate::errors::AppError;
    use crate::services::testing::{pdf, TestJournal};
    use crate::services::FileUpload;
    use std::time::Duration;
    use tokio_test::assert_err;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_numbers_start_at_one_and_increase() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let s = &journal.services;
        let paper = s.papers.create(&author, "T", None, vec![]).await.unwrap().article;

        for expected in 1..=3 {
            let v = s
                .versions
                .upload(&author, paper.id, Some(pdf("x.pdf")), Some(format!("rev {}", expected)))
                .await
                .unwrap();
            assert_eq!(v.version_number, expected);
            assert_eq!(v.uploaded_by, author.id);
            assert_eq!(
                v.storage_path,
                format!("{}/{}/v{}/x.pdf", author.id, paper.id, expected)
            );
        }

        let versions = s.versions.list(Some(&author), paper.id).await.unwrap();
        let numbers: Vec<i32> = versions.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);

        let stored = journal.repo.find_article(paper.id).await.unwrap().unwrap();
        assert_eq!(stored.current_version_id, Some(versions[0].id));
        assert_eq!(journal.store.paths().await.len(), 3);
    }

    #[tokio::test]
    async fn test_second_upload_within_cooldown_is_throttled() {
        let journal = TestJournal::with_cooldown(Duration::from_secs(5)).await;
        let author = journal.actor(Role::Prof).await;
        let admin = journal.admin().await;
        let s = &journal.services;
        let paper = s.papers.create(&author, "T", None, vec![]).await.unwrap().article;

        s.versions.upload(&author, paper.id, Some(pdf("a.pdf")), None).await.unwrap();

        // the window is per paper, not per uploader
        let err = s
            .versions
            .upload(&admin, paper.id, Some(pdf("b.pdf")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Throttled { retry_after_secs } if retry_after_secs >= 1));

        assert_eq!(journal.repo.list_versions(paper.id).await.unwrap().len(), 1);
        assert_eq!(journal.store.paths().await.len(), 1);

        // other papers are unaffected
        let other = s.papers.create(&author, "U", None, vec![]).await.unwrap().article;
        s.versions.upload(&author, other.id, Some(pdf("a.pdf")), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_uploads_get_distinct_numbers() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let s = &journal.services;
        let paper = s.papers.create(&author, "T", None, vec![]).await.unwrap().article;

        let (a, b) = tokio::join!(
            s.versions.upload(&author, paper.id, Some(pdf("a.pdf")), None),
            s.versions.upload(&author, paper.id, Some(pdf("b.pdf")), None),
        );

        let mut numbers = vec![a.unwrap().version_number, b.unwrap().version_number];
        numbers.sort();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_duplicate_number_is_a_conflict() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let paper = journal
            .services
            .papers
            .create(&author, "T", None, vec![])
            .await
            .unwrap()
            .article;

        let new_version = |path: &str| NewVersion {
            article_id: paper.id,
            version_number: 1,
            storage_path: path.to_string(),
            file_name: "x.pdf".to_string(),
            file_size: None,
            notes: None,
            uploaded_by: author.id,
        };

        let txn = journal.repo.begin().await.unwrap();
        Repository::insert_version_in(&txn, new_version("a")).await.unwrap();
        let err = Repository::insert_version_in(&txn, new_version("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_failed_store_leaves_no_version() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let s = &journal.services;
        let paper = s.papers.create(&author, "T", None, vec![]).await.unwrap().article;

        journal.store.set_failing(true);
        let err = s
            .versions
            .upload(&author, paper.id, Some(pdf("x.pdf")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }));

        assert!(journal.repo.list_versions(paper.id).await.unwrap().is_empty());
        let stored = journal.repo.find_article(paper.id).await.unwrap().unwrap();
        assert_eq!(stored.current_version_id, None);

        journal.store.set_failing(false);
        let v = s.versions.upload(&author, paper.id, Some(pdf("x.pdf")), None).await.unwrap();
        assert_eq!(v.version_number, 1);
    }

    #[tokio::test]
    async fn test_upload_permissions_and_validation() {
        let journal = TestJournal::new().await;
        let author = journal.actor(Role::Prof).await;
        let co_author = journal.actor(Role::Mentee).await;
        let stranger = journal.actor(Role::Mentor).await;
        let s = &journal.services;
        let paper = s
            .papers
            .create(&author, "T", None, vec![co_author.id])
            .await
            .unwrap()
            .article;

        let err = s
            .versions
            .upload(&stranger, paper.id, Some(pdf("x.pdf")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let v = s
            .versions
            .upload(&co_author, paper.id, Some(pdf("x.pdf")), None)
            .await
            .unwrap();
        assert!(v.storage_path.starts_with(&co_author.id.to_string()));

        let err = s
            .versions
            .upload(&author, paper.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_err!(
            s.versions
                .upload(&author, paper.id, Some(FileUpload::new("e.pdf", "application/pdf", vec![])), None)
                .await
        );

        assert_err!(s.versions.upload(&author, Uuid::new_v4(), Some(pdf("x.pdf")), None).await);
    }
}
