//! Profile reads and edits
//!
//! Rows are created by the identity provider; here they are only read, edited
//! by their owner, or re-ranked by an administrator.

use super::{optional_text, required_text, JournalSettings};
use crate::db::models::{AdminType, Profile, Role};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::pagination::Page;
use crate::policy::{require_catalog, Actor};
use tracing::info;
use uuid::Uuid;

const SEARCH_LIMIT: u64 = 20;

#[derive(Clone)]
pub struct ProfileService {
    repo: Repository,
    settings: JournalSettings,
}

impl ProfileService {
    pub fn new(repo: Repository, settings: JournalSettings) -> Self {
        Self { repo, settings }
    }

    /// Profile row behind an authenticated identity
    pub async fn find(&self, id: Uuid) -> Result<Profile> {
        self.repo
            .find_profile(id)
            .await?
            .ok_or_else(|| AppError::not_found("Profile", id))
    }

    pub async fn current(&self, actor: &Actor) -> Result<Profile> {
        self.find(actor.id).await
    }

    /// Self-service edit; `intro: Some("")` clears the intro
    pub async fn update_own(
        &self,
        actor: &Actor,
        full_name: Option<String>,
        intro: Option<String>,
    ) -> Result<Profile> {
        let full_name = full_name
            .map(|name| required_text(&name, "full_name"))
            .transpose()?;
        let intro = intro.map(|i| optional_text(Some(i)));

        let profile = self
            .repo
            .update_profile(actor.id, full_name, intro)
            .await?
            .ok_or_else(|| AppError::not_found("Profile", actor.id))?;

        info!(profile_id = %actor.id, "Profile updated");
        Ok(profile)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> Result<Page<Profile>> {
        require_catalog(actor)?;

        let request = self.settings.page(page, per_page);
        let (profiles, total) = self.repo.list_profiles(request).await?;
        Ok(Page::new(profiles, total, request))
    }

    /// Admin-only change of the two privilege signals
    pub async fn update_roles(
        &self,
        actor: &Actor,
        profile_id: Uuid,
        role: Option<Role>,
        admin_type: Option<AdminType>,
    ) -> Result<Profile> {
        require_catalog(actor)?;

        if role.is_none() && admin_type.is_none() {
            return Err(AppError::Validation {
                message: "Nothing to update".to_string(),
                field: None,
            });
        }

        let profile = self
            .repo
            .update_profile_roles(profile_id, role, admin_type)
            .await?
            .ok_or_else(|| AppError::not_found("Profile", profile_id))?;

        info!(
            admin_id = %actor.id,
            profile_id = %profile_id,
            role = ?profile.role_type,
            admin_type = ?profile.admin_type,
            "Profile roles changed"
        );
        Ok(profile)
    }

    /// Name/email lookup used when picking co-authors
    pub async fn search(&self, query: &str) -> Result<Vec<Profile>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.search_profiles(query, SEARCH_LIMIT).await
    }
}
