//! Fixtures shared by the service tests: an in-memory SQLite database with
//! the full schema and an in-memory object store.

use super::{FileUpload, JournalSettings, Services};
use crate::db::models::{AdminType, Profile, Role};
use crate::db::{ensure_schema, DbPool, Repository};
use crate::policy::Actor;
use crate::storage::MemoryObjectStore;
use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub(crate) struct TestJournal {
    pub repo: Repository,
    pub store: Arc<MemoryObjectStore>,
    pub services: Services,
}

impl TestJournal {
    /// Cooldown disabled so tests can upload back to back
    pub async fn new() -> Self {
        Self::with_cooldown(Duration::ZERO).await
    }

    pub async fn with_cooldown(cooldown: Duration) -> Self {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        // One connection: every connection to :memory: is a separate database
        opts.max_connections(1).min_connections(1).sqlx_logging(false);

        let conn = Database::connect(opts).await.expect("sqlite connects");
        ensure_schema(&conn).await.expect("schema");

        let repo = Repository::new(DbPool::from_connection(conn));
        let store = Arc::new(MemoryObjectStore::new());
        let settings = JournalSettings {
            version_cooldown: cooldown,
            ..JournalSettings::default()
        };
        let services = Services::new(repo.clone(), store.clone(), settings);

        Self {
            repo,
            store,
            services,
        }
    }

    pub async fn profile(&self, role: Role, admin_type: AdminType) -> Profile {
        let id = Uuid::new_v4();
        self.repo
            .create_profile(
                id,
                format!("{}@example.com", id.simple()),
                format!("User {}", &id.simple().to_string()[..6]),
                role,
                admin_type,
            )
            .await
            .expect("profile inserted")
    }

    pub async fn actor(&self, role: Role) -> Actor {
        Actor::from(&self.profile(role, AdminType::User).await)
    }

    pub async fn admin(&self) -> Actor {
        Actor::from(&self.profile(Role::Admin, AdminType::Admin).await)
    }
}

pub(crate) fn pdf(name: &str) -> FileUpload {
    FileUpload::new(name, "application/pdf", b"%PDF-1.7 test".to_vec())
}

pub(crate) fn png(name: &str) -> FileUpload {
    FileUpload::new(name, "image/png", vec![0x89, 0x50, 0x4e, 0x47])
}
