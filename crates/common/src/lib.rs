//! DocVault Common Library
//!
//! Shared code for the DocVault backend including:
//! - Database models, listing queries and the repository
//! - Role-based access policy
//! - Document, chat and enrichment services
//! - Intelligence collaborator client and blob storage
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod intelligence;
pub mod metrics;
pub mod services;
pub mod storage;

// Re-export commonly used types
pub use auth::{Principal, Role};
pub use config::AppConfig;
pub use db::Repository;
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
