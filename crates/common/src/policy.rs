//! Authorization predicates
//!
//! Every route answers the same three questions: may this actor change a row
//! it may not own, may it answer Q&A questions, and may it curate the catalog.
//! The answers live here so routes cannot drift apart.

use crate::db::models::{AdminType, Profile, Role};
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The signed-in user acting on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub admin_type: AdminType,
}

impl Actor {
    pub fn new(id: Uuid, role: Role, admin_type: AdminType) -> Self {
        Self {
            id,
            role,
            admin_type,
        }
    }

    /// Either privilege signal grants admin rights
    pub fn is_admin(&self) -> bool {
        is_admin(self.role, self.admin_type)
    }
}

impl From<&Profile> for Actor {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            role: profile.role_type,
            admin_type: profile.admin_type,
        }
    }
}

/// Canonical admin predicate
pub fn is_admin(role: Role, admin_type: AdminType) -> bool {
    role == Role::Admin || admin_type == AdminType::Admin
}

/// Owner or admin
pub fn can_mutate(actor_id: Uuid, actor_is_admin: bool, owner_id: Uuid) -> bool {
    actor_id == owner_id || actor_is_admin
}

/// Mentor or admin
pub fn can_reply(role: Role, actor_is_admin: bool) -> bool {
    role == Role::Mentor || actor_is_admin
}

/// Issues, volumes and board announcements
pub fn can_manage_catalog(role: Role, admin_type: AdminType) -> bool {
    is_admin(role, admin_type)
}

pub fn require_mutate(actor: &Actor, owner_id: Uuid, what: &str) -> Result<()> {
    if can_mutate(actor.id, actor.is_admin(), owner_id) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "Only the author or an administrator may change this {}",
            what
        )))
    }
}

pub fn require_reply(actor: &Actor) -> Result<()> {
    if can_reply(actor.role, actor.is_admin()) {
        Ok(())
    } else {
        Err(AppError::forbidden("Only mentors and administrators may reply"))
    }
}

pub fn require_catalog(actor: &Actor) -> Result<()> {
    if can_manage_catalog(actor.role, actor.admin_type) {
        Ok(())
    } else {
        Err(AppError::forbidden("Administrator role required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role, admin_type: AdminType) -> Actor {
        Actor::new(Uuid::new_v4(), role, admin_type)
    }

    #[test]
    fn test_can_mutate() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(can_mutate(owner, false, owner));
        assert!(can_mutate(other, true, owner));
        assert!(!can_mutate(other, false, owner));
    }

    #[test]
    fn test_admin_signals_are_equivalent() {
        assert!(actor(Role::Admin, AdminType::User).is_admin());
        assert!(actor(Role::Prof, AdminType::Admin).is_admin());
        assert!(!actor(Role::Prof, AdminType::User).is_admin());
    }

    #[test]
    fn test_can_reply() {
        assert!(can_reply(Role::Mentor, false));
        assert!(can_reply(Role::Mentee, true));
        assert!(!can_reply(Role::Mentee, false));
        assert!(!can_reply(Role::Prof, false));
    }

    #[test]
    fn test_require_catalog() {
        assert!(require_catalog(&actor(Role::Admin, AdminType::User)).is_ok());
        assert!(require_catalog(&actor(Role::Mentor, AdminType::Admin)).is_ok());

        let err = require_catalog(&actor(Role::Mentor, AdminType::User)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[test]
    fn test_require_mutate_rejects_stranger() {
        let stranger = actor(Role::Prof, AdminType::User);
        let err = require_mutate(&stranger, Uuid::new_v4(), "paper").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
        assert!(require_mutate(&stranger, stranger.id, "paper").is_ok());
    }
}
