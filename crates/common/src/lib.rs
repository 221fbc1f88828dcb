//! Minjok Journal Common Library
//!
//! Shared code for the journal gateway including:
//! - Database models, schema bootstrap and the repository
//! - Paper lifecycle, version numbering and cooldown rules
//! - Authorization predicates
//! - Object storage backends
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities and the profile cache
//! - Metrics and observability

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod lifecycle;
pub mod metrics;
pub mod pagination;
pub mod policy;
pub mod services;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::Repository;
pub use errors::{AppError, Result};
pub use policy::Actor;
pub use services::Services;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
