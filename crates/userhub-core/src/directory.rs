//! User directory abstraction
//!
//! The authentication layer never talks to a database directly; it goes
//! through `UserDirectory`. `InMemoryUserDirectory` is the process-local
//! implementation used by default and in tests.

use crate::models::{normalize_email, NewUser, Page, SortField, SortOrder, User, UserChanges, UserQuery};
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Directory errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already taken")]
    EmailTaken,

    #[error("Directory backend error: {0}")]
    Backend(String),
}

/// Lookup and persistence of user accounts
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError>;

    /// Insert a user. Fails with `EmailTaken` if the email is already present.
    async fn create(&self, user: NewUser) -> Result<User, DirectoryError>;

    /// Whether `email` belongs to any user other than `exclude_id`
    async fn email_taken(&self, email: &str, exclude_id: Option<Uuid>)
        -> Result<bool, DirectoryError>;

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, DirectoryError>;

    /// Remove a user, returning the deleted record
    async fn delete(&self, id: Uuid) -> Result<User, DirectoryError>;

    async fn query(&self, query: &UserQuery) -> Result<Page<User>, DirectoryError>;
}

/// Process-local user directory
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn compare(a: &User, b: &User, field: SortField) -> Ordering {
    match field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::Email => a.email.cmp(&b.email),
        SortField::Role => a.role.as_str().cmp(b.role.as_str()),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, DirectoryError> {
        let email = normalize_email(&user.email);
        // Uniqueness check and insert happen under one write guard
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(DirectoryError::EmailTaken);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email,
            password_hash: user.password_hash,
            role: user.role,
            is_email_verified: user.is_email_verified,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn email_taken(
        &self,
        email: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, DirectoryError> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users
            .values()
            .any(|u| u.email == email && Some(u.id) != exclude_id))
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, DirectoryError> {
        let mut users = self.users.write().await;

        if let Some(email) = changes.email.as_deref() {
            let email = normalize_email(email);
            if users.values().any(|u| u.email == email && u.id != id) {
                return Err(DirectoryError::EmailTaken);
            }
        }

        let user = users.get_mut(&id).ok_or(DirectoryError::NotFound)?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = normalize_email(&email);
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(verified) = changes.is_email_verified {
            user.is_email_verified = verified;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<User, DirectoryError> {
        self.users
            .write()
            .await
            .remove(&id)
            .ok_or(DirectoryError::NotFound)
    }

    async fn query(&self, query: &UserQuery) -> Result<Page<User>, DirectoryError> {
        let users = self.users.read().await;
        let mut matched: Vec<User> = users
            .values()
            .filter(|u| query.filter.matches(u))
            .cloned()
            .collect();

        match query.sort_by {
            Some(field) => {
                matched.sort_by(|a, b| compare(a, b, field));
                if query.sort_order == SortOrder::Desc {
                    matched.reverse();
                }
            }
            None => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        let total = matched.len() as u64;
        let results = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit.max(1) as usize)
            .collect();

        Ok(Page::new(results, query, total))
    }
}
