//! Journal services
//!
//! Each service owns one area of the journal and combines the repository,
//! the authorization predicates, the lifecycle rules and (where files are
//! involved) the object store. Handlers stay thin.

mod board;
mod catalog;
mod comments;
mod papers;
mod profiles;
mod qna;
mod versions;

#[cfg(test)]
pub(crate) mod testing;

pub use board::{BoardPostDetail, BoardService};
pub use catalog::{CatalogService, IssueDetail, NewIssue, NewVolume, VolumeDetail};
pub use comments::{CommentService, CommentThread};
pub use papers::{PaperDetail, PaperService};
pub use profiles::ProfileService;
pub use qna::{QnaService, QuestionDetail};
pub use versions::VersionService;

use crate::config::JournalConfig;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::pagination::PageRequest;
use crate::storage::ObjectStore;
use std::sync::Arc;
use std::time::Duration;

/// Tunables the services read at runtime
#[derive(Debug, Clone)]
pub struct JournalSettings {
    pub version_cooldown: Duration,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl JournalSettings {
    pub fn page(&self, page: Option<u64>, per_page: Option<u64>) -> PageRequest {
        PageRequest::new(page, per_page, self.default_page_size, self.max_page_size)
    }
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            version_cooldown: Duration::from_secs(5),
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl From<&JournalConfig> for JournalSettings {
    fn from(config: &JournalConfig) -> Self {
        Self {
            version_cooldown: Duration::from_secs(config.version_cooldown_secs),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}

/// A file received from a multipart form
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.file_name.trim().is_empty()
    }

    /// Reject a missing or zero-byte file for `field`
    pub(crate) fn require(upload: Option<FileUpload>, field: &str) -> Result<FileUpload> {
        match upload {
            Some(upload) if !upload.is_empty() => Ok(upload),
            _ => Err(AppError::validation(field, format!("A {} file is required", field))),
        }
    }
}

/// Trimmed, non-empty text or a validation error on `field`
pub(crate) fn required_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AppError::validation(field, format!("{} is required", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Blank optional text collapses to `None`
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Every service, wired to the same repository and store
#[derive(Clone)]
pub struct Services {
    pub profiles: ProfileService,
    pub papers: PaperService,
    pub versions: VersionService,
    pub comments: CommentService,
    pub board: BoardService,
    pub qna: QnaService,
    pub catalog: CatalogService,
    pub settings: JournalSettings,
}

impl Services {
    pub fn new(repo: Repository, store: Arc<dyn ObjectStore>, settings: JournalSettings) -> Self {
        Self {
            profiles: ProfileService::new(repo.clone(), settings.clone()),
            papers: PaperService::new(repo.clone(), store.clone(), settings.clone()),
            versions: VersionService::new(repo.clone(), store.clone(), settings.clone()),
            comments: CommentService::new(repo.clone()),
            board: BoardService::new(repo.clone(), settings.clone()),
            qna: QnaService::new(repo.clone(), settings.clone()),
            catalog: CatalogService::new(repo, store),
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("  Final ", "title").unwrap(), "Final");
        let err = required_text("   ", "title").unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(ref f), .. } if f == "title"));
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(Some("  ".to_string())), None);
        assert_eq!(optional_text(Some(" a ".to_string())), Some("a".to_string()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn test_require_upload() {
        assert!(FileUpload::require(None, "cover").is_err());
        assert!(FileUpload::require(Some(FileUpload::new("c.png", "image/png", vec![])), "cover").is_err());
        assert!(FileUpload::require(Some(FileUpload::new("c.png", "image/png", vec![1])), "cover").is_ok());
    }

    #[test]
    fn test_page_from_settings() {
        let settings = JournalSettings::default();
        let page = settings.page(Some(2), Some(500));
        assert_eq!(page.page, 2);
        assert_eq!(page.per_page, 100);
    }
}
