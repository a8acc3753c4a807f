//! userhub Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout userhub:
//! - User and identity models (roles, profile records, queries)
//! - The `UserDirectory` trait consumed by the authentication layer
//! - In-memory and PostgreSQL directory implementations
//! - Configuration management

pub mod config;
pub mod directory;
pub mod models;
pub mod postgres;

pub use config::{
    parse_duration_secs, AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig,
    ServerConfig,
};
pub use directory::{DirectoryError, InMemoryUserDirectory, UserDirectory};
pub use models::{
    normalize_email, Identity, NewUser, Page, Role, SortField, SortOrder, User, UserChanges,
    UserFilter, UserPage, UserQuery,
};
pub use postgres::PgUserDirectory;
