//! Issue and volume catalog
//!
//! An issue bundles published papers, a volume bundles released issues.
//! Creation validates everything up front, then writes the row, claims the
//! members (unique per member) and stores the cover inside one transaction.

use super::{optional_text, required_text, FileUpload};
use crate::db::models::{Article, Issue, ReleaseStatus, Volume};
use crate::db::{NewCatalogEntry, Repository};
use crate::errors::{AppError, Result};
use crate::metrics::record_catalog_created;
use crate::policy::{require_catalog, Actor};
use crate::storage::{issue_cover_path, volume_cover_path, ObjectStore};
use chrono::NaiveDate;
use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub description: Option<String>,
    pub status: ReleaseStatus,
    pub release_date: Option<NaiveDate>,
    pub article_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewVolume {
    pub title: String,
    pub description: Option<String>,
    pub status: ReleaseStatus,
    pub release_date: Option<NaiveDate>,
    pub issue_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueDetail {
    #[serde(flatten)]
    pub issue: Issue,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeDetail {
    #[serde(flatten)]
    pub volume: Volume,
    pub issues: Vec<Issue>,
}

/// Non-empty, duplicate-free member list
fn member_ids(ids: Vec<Uuid>, field: &str, what: &str) -> Result<Vec<Uuid>> {
    if ids.is_empty() {
        return Err(AppError::validation(field, format!("Select at least one {}", what)));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(AppError::validation(field, format!("{} {} selected twice", what, dup)));
    }
    Ok(ids)
}

/// Released entries without a date are released today
fn entry(title: String, description: Option<String>, status: ReleaseStatus, release_date: Option<NaiveDate>) -> NewCatalogEntry {
    let release_date = match status {
        ReleaseStatus::Released => release_date.or_else(|| Some(chrono::Utc::now().date_naive())),
        ReleaseStatus::Draft => release_date,
    };

    NewCatalogEntry {
        title,
        description,
        status,
        release_date,
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repo: Repository,
    store: Arc<dyn ObjectStore>,
}

impl CatalogService {
    pub fn new(repo: Repository, store: Arc<dyn ObjectStore>) -> Self {
        Self { repo, store }
    }

    /// Commit, or roll back and drop the cover when anything failed
    async fn finish<T>(
        &self,
        txn: DatabaseTransaction,
        written: Result<T>,
        cover_path: &str,
    ) -> Result<T> {
        let value = match written {
            Ok(value) => value,
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                self.remove_cover(cover_path).await;
                return Err(e);
            }
        };

        if let Err(e) = txn.commit().await {
            self.remove_cover(cover_path).await;
            return Err(e.into());
        }

        Ok(value)
    }

    /// Best effort; the cover may never have been uploaded
    async fn remove_cover(&self, cover_path: &str) {
        if let Err(e) = self.store.remove(&[cover_path.to_string()]).await {
            warn!(path = cover_path, error = %e, "Failed to remove orphaned cover");
        }
    }

    // ========================================================================
    // Issues
    // ========================================================================

    /// Published papers that no issue has claimed yet
    pub async fn available_articles(&self, actor: &Actor) -> Result<Vec<Article>> {
        require_catalog(actor)?;
        self.repo.available_articles().await
    }

    pub async fn create_issue(&self, actor: &Actor, new: NewIssue, cover: Option<FileUpload>) -> Result<Issue> {
        require_catalog(actor)?;
        let title = required_text(&new.title, "title")?;
        let article_ids = member_ids(new.article_ids, "article_ids", "paper")?;
        let cover = FileUpload::require(cover, "cover")?;

        let available: HashSet<Uuid> = self
            .repo
            .available_articles()
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
        if let Some(taken) = article_ids.iter().find(|id| !available.contains(id)) {
            return Err(AppError::validation(
                "article_ids",
                format!("Paper {} is not published or already belongs to an issue", taken),
            ));
        }

        let entry = entry(title, optional_text(new.description), new.status, new.release_date);

        let txn = self.repo.begin().await?;
        let issue_id = Uuid::new_v4();
        let cover_path = issue_cover_path(issue_id, &cover.file_name);
        let written = self
            .write_issue(&txn, issue_id, entry, &article_ids, &cover, &cover_path)
            .await;
        let issue = self.finish(txn, written, &cover_path).await?;

        record_catalog_created("issue");
        info!(
            issue_id = %issue.id,
            admin_id = %actor.id,
            articles = article_ids.len(),
            status = ?issue.status,
            "Issue created"
        );
        Ok(issue)
    }

    async fn write_issue(
        &self,
        txn: &DatabaseTransaction,
        issue_id: Uuid,
        entry: NewCatalogEntry,
        article_ids: &[Uuid],
        cover: &FileUpload,
        cover_path: &str,
    ) -> Result<Issue> {
        Repository::insert_issue_in(txn, issue_id, entry).await?;
        Repository::attach_articles_in(txn, issue_id, article_ids).await?;

        self.store
            .upload(cover_path, cover.data.clone(), &cover.content_type)
            .await?;

        let url = self.store.public_url(cover_path);
        Repository::set_issue_cover_in(txn, issue_id, url, cover_path.to_string()).await
    }

    /// Drafts are listed for administrators only
    pub async fn list_issues(&self, viewer: Option<&Actor>) -> Result<Vec<Issue>> {
        let include_drafts = viewer.is_some_and(|a| a.is_admin());
        self.repo.list_issues(include_drafts).await
    }

    pub async fn get_issue(&self, viewer: Option<&Actor>, id: Uuid) -> Result<IssueDetail> {
        let issue = self
            .repo
            .find_issue(id)
            .await?
            .filter(|i| i.status == ReleaseStatus::Released || viewer.is_some_and(|a| a.is_admin()))
            .ok_or_else(|| AppError::not_found("Issue", id))?;

        let articles = self.repo.issue_articles(id).await?;
        Ok(IssueDetail { issue, articles })
    }

    /// `draft -> released`
    pub async fn release_issue(&self, actor: &Actor, id: Uuid, release_date: Option<NaiveDate>) -> Result<Issue> {
        require_catalog(actor)?;
        let issue = self
            .repo
            .find_issue(id)
            .await?
            .ok_or_else(|| AppError::not_found("Issue", id))?;

        let date = release_date
            .or(issue.release_date)
            .unwrap_or_else(|| chrono::Utc::now().date_naive());

        let released = self.repo.release_issue(id, date).await?.ok_or_else(|| AppError::Conflict {
            message: "Issue is already released".to_string(),
        })?;

        info!(issue_id = %id, admin_id = %actor.id, release_date = %date, "Issue released");
        Ok(released)
    }

    pub async fn delete_issue(&self, actor: &Actor, id: Uuid) -> Result<()> {
        require_catalog(actor)?;
        let issue = self
            .repo
            .find_issue(id)
            .await?
            .ok_or_else(|| AppError::not_found("Issue", id))?;

        self.repo.delete_issue(id).await?;

        if let Some(path) = issue.cover_path {
            if let Err(e) = self.store.remove(&[path]).await {
                warn!(issue_id = %id, error = %e, "Failed to remove issue cover");
            }
        }

        info!(issue_id = %id, admin_id = %actor.id, "Issue deleted");
        Ok(())
    }

    // ========================================================================
    // Volumes
    // ========================================================================

    /// Released issues that no volume has claimed yet
    pub async fn available_issues(&self, actor: &Actor) -> Result<Vec<Issue>> {
        require_catalog(actor)?;
        self.repo.available_issues().await
    }

    pub async fn create_volume(&self, actor: &Actor, new: NewVolume, cover: Option<FileUpload>) -> Result<Volume> {
        require_catalog(actor)?;
        let title = required_text(&new.title, "title")?;
        let issue_ids = member_ids(new.issue_ids, "issue_ids", "issue")?;
        let cover = FileUpload::require(cover, "cover")?;

        let available: HashSet<Uuid> = self
            .repo
            .available_issues()
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        if let Some(taken) = issue_ids.iter().find(|id| !available.contains(id)) {
            return Err(AppError::validation(
                "issue_ids",
                format!("Issue {} is not released or already belongs to a volume", taken),
            ));
        }

        let entry = entry(title, optional_text(new.description), new.status, new.release_date);

        let txn = self.repo.begin().await?;
        let volume_id = Uuid::new_v4();
        let cover_path = volume_cover_path(volume_id, &cover.file_name);
        let written = self
            .write_volume(&txn, volume_id, entry, &issue_ids, &cover, &cover_path)
            .await;
        let volume = self.finish(txn, written, &cover_path).await?;

        record_catalog_created("volume");
        info!(
            volume_id = %volume.id,
            admin_id = %actor.id,
            issues = issue_ids.len(),
            "Volume created"
        );
        Ok(volume)
    }

    async fn write_volume(
        &self,
        txn: &DatabaseTransaction,
        volume_id: Uuid,
        entry: NewCatalogEntry,
        issue_ids: &[Uuid],
        cover: &FileUpload,
        cover_path: &str,
    ) -> Result<Volume> {
        Repository::insert_volume_in(txn, volume_id, entry).await?;
        Repository::attach_issues_in(txn, volume_id, issue_ids).await?;

        self.store
            .upload(cover_path, cover.data.clone(), &cover.content_type)
            .await?;

        let url = self.store.public_url(cover_path);
        Repository::set_volume_cover_in(txn, volume_id, url, cover_path.to_string()).await
    }

    pub async fn list_volumes(&self, viewer: Option<&Actor>) -> Result<Vec<Volume>> {
        let include_drafts = viewer.is_some_and(|a| a.is_admin());
        self.repo.list_volumes(include_drafts).await
    }

    pub async fn get_volume(&self, viewer: Option<&Actor>, id: Uuid) -> Result<VolumeDetail> {
        let volume = self
            .repo
            .find_volume(id)
            .await?
            .filter(|v| v.status == ReleaseStatus::Released || viewer.is_some_and(|a| a.is_admin()))
            .ok_or_else(|| AppError::not_found("Volume", id))?;

        let issues = self.repo.volume_issues(id).await?;
        Ok(VolumeDetail { volume, issues })
    }

    pub async fn delete_volume(&self, actor: &Actor, id: Uuid) -> Result<()> {
        require_catalog(actor)?;
        let volume = self
            .repo
            .find_volume(id)
            .await?
            .ok_or_else(|| AppError::not_found("Volume", id))?;

        self.repo.delete_volume(id).await?;

        if let Some(path) = volume.cover_path {
            if let Err(e) = self.store.remove(&[path]).await {
                warn!(volume_id = %id, error = %e, "Failed to remove volume cover");
            }
        }

        info!(volume_id = %id, admin_id = %actor.id, "Volume deleted");
        Ok(())
    }
}
