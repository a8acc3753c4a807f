//! Domain models for users and identities
//!
//! - `Role` / `Identity`: what an authenticated token carries
//! - `User`: the stored profile record (password hash never serialized)
//! - `NewUser` / `UserChanges`: inputs to the user directory
//! - `UserQuery` / `Page`: filtering, sorting and pagination

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// User role
///
/// Every account is either a regular user or an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// The authenticated subject carried inside an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque subject identifier (the user id)
    pub subject_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(subject_id: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Stored user account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Lowercased, trimmed, unique
    pub email: String,
    /// Argon2id PHC string; never leaves the service
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Identity to embed in tokens issued for this user
    pub fn identity(&self) -> Identity {
        Identity::new(self.id.to_string(), self.role)
    }
}

/// Data needed to create a user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_email_verified: bool,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: &str, password_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: normalize_email(email),
            password_hash: password_hash.into(),
            role: Role::User,
            is_email_verified: false,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Partial update of a user; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub is_email_verified: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.is_email_verified.is_none()
    }
}

/// Exact-match filters for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_email_verified: Option<bool>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        self.name.as_ref().map_or(true, |n| &user.name == n)
            && self
                .email
                .as_ref()
                .map_or(true, |e| user.email == normalize_email(e))
            && self.role.map_or(true, |r| user.role == r)
            && self
                .is_email_verified
                .map_or(true, |v| user.is_email_verified == v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Sortable user columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Name,
    Email,
    Role,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// Column name in the relational schema
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Email => "email",
            SortField::Role => "role",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

/// Listing request: filter, sort, and 1-based pagination
#[derive(Debug, Clone)]
pub struct UserQuery {
    pub filter: UserFilter,
    /// Newest first when unset
    pub sort_by: Option<SortField>,
    pub sort_order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            filter: UserFilter::default(),
            sort_by: None,
            sort_order: SortOrder::Asc,
            page: 1,
            limit: 10,
        }
    }
}

impl UserQuery {
    /// Number of records to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit.max(1))
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[aliases(UserPage = Page<User>)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
    pub total_results: u64,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, query: &UserQuery, total_results: u64) -> Self {
        let limit = query.limit.max(1);
        Self {
            results,
            page: query.page.max(1),
            limit,
            total_pages: total_results.div_ceil(u64::from(limit)),
            total_results,
        }
    }
}

/// Canonical form used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            password_hash: "$argon2id$secret".to_string(),
            role,
            is_email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" User ".parse::<Role>().unwrap(), Role::User);
        assert!("editor".parse::<Role>().is_err());
    }

    #[test]
    fn test_user_json_hides_password_hash() {
        let json = serde_json::to_value(user("Alice", Role::User)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["isEmailVerified"], false);
    }

    #[test]
    fn test_identity_from_user() {
        let u = user("Root", Role::Admin);
        let identity = u.identity();
        assert_eq!(identity.subject_id, u.id.to_string());
        assert!(identity.is_admin());
    }

    #[test]
    fn test_filter_matches() {
        let u = user("Bob", Role::User);
        let by_email = UserFilter {
            email: Some("  BOB@example.com".to_string()),
            ..Default::default()
        };
        let by_role = UserFilter {
            role: Some(Role::Admin),
            ..Default::default()
        };

        assert!(UserFilter::default().matches(&u));
        assert!(by_email.matches(&u));
        assert!(!by_role.matches(&u));
    }

    #[test]
    fn test_page_math() {
        let query = UserQuery {
            page: 3,
            limit: 4,
            ..Default::default()
        };
        assert_eq!(query.offset(), 8);

        let page: Page<u8> = Page::new(vec![], &query, 9);
        assert_eq!(page.total_pages, 3);

        let empty: Page<u8> = Page::new(vec![], &UserQuery::default(), 0);
        assert_eq!(empty.total_pages, 0);
    }
}
