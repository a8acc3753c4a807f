//! User administration service
//!
//! Admin-facing CRUD over the user directory. Passwords are hashed here so
//! the directory only ever sees PHC strings.

use crate::auth::password::{validate_password_strength, CredentialVerifier};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use userhub_core::{
    NewUser, Page, Role, SortField, SortOrder, User, UserChanges, UserDirectory, UserFilter,
    UserQuery,
};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Body of `POST /users`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    /// Defaults to `user`
    pub role: Option<Role>,
    pub is_email_verified: Option<bool>,
}

/// Body of `PATCH /users/{id}`; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_email_verified: Option<bool>,
}

/// Query string of `GET /users`
#[derive(Debug, Clone, Default, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserListParams {
    /// Exact name match
    pub name: Option<String>,
    /// Exact email match (case-insensitive)
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_email_verified: Option<bool>,
    /// Sort column; newest first when absent
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
    /// 1-based page number (default 1)
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,
    /// Page size (default 10, max 100)
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
}

impl From<UserListParams> for UserQuery {
    fn from(params: UserListParams) -> Self {
        let defaults = UserQuery::default();
        UserQuery {
            filter: UserFilter {
                name: params.name,
                email: params.email,
                role: params.role,
                is_email_verified: params.is_email_verified,
            },
            sort_by: params.sort_by,
            sort_order: params.sort_order.unwrap_or(defaults.sort_order),
            page: params.page.unwrap_or(defaults.page),
            limit: params.limit.unwrap_or(defaults.limit),
        }
    }
}

pub struct UserService {
    directory: Arc<dyn UserDirectory>,
    credentials: CredentialVerifier,
}

impl UserService {
    pub fn new(directory: Arc<dyn UserDirectory>, credentials: CredentialVerifier) -> Self {
        Self {
            directory,
            credentials,
        }
    }

    /// Create an account on behalf of an administrator
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, AppError> {
        validate_password_strength(&request.password)?;

        if self.directory.email_taken(&request.email, None).await? {
            return Err(AppError::DuplicateIdentity);
        }

        let password_hash = self.credentials.hash_blocking(request.password).await?;
        let mut new_user = NewUser::new(request.name, &request.email, password_hash)
            .with_role(request.role.unwrap_or_default());
        new_user.is_email_verified = request.is_email_verified.unwrap_or(false);

        Ok(self.directory.create(new_user).await?)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, AppError> {
        self.directory
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn update_user(&self, id: Uuid, request: UpdateUserRequest) -> Result<User, AppError> {
        let mut changes = UserChanges {
            name: request.name,
            email: request.email,
            password_hash: None,
            role: request.role,
            is_email_verified: request.is_email_verified,
        };
        if changes.is_empty() && request.password.is_none() {
            return Err(AppError::validation("At least one field must be provided"));
        }

        // Existence first so an unknown id is reported as such
        self.get_user(id).await?;

        if let Some(email) = &changes.email {
            if self.directory.email_taken(email, Some(id)).await? {
                return Err(AppError::DuplicateIdentity);
            }
        }

        if let Some(password) = request.password {
            validate_password_strength(&password)?;
            changes.password_hash = Some(self.credentials.hash_blocking(password).await?);
        }

        Ok(self.directory.update(id, changes).await?)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<User, AppError> {
        Ok(self.directory.delete(id).await?)
    }

    pub async fn query_users(&self, query: &UserQuery) -> Result<Page<User>, AppError> {
        Ok(self.directory.query(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordConfig;
    use userhub_core::InMemoryUserDirectory;

    fn service() -> UserService {
        UserService::new(
            Arc::new(InMemoryUserDirectory::new()),
            CredentialVerifier::new(PasswordConfig::minimal()),
        )
    }

    fn create_request(name: &str, email: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: "Passw0rd".to_string(),
            role: None,
            is_email_verified: None,
        }
    }

    #[tokio::test]
    async fn test_create_user_defaults() {
        let users = service();
        let user = users.create_user(create_request("Bob", "Bob@X.com")).await.unwrap();

        assert_eq!(user.email, "bob@x.com");
        assert_eq!(user.role, Role::User);
        assert!(!user.is_email_verified);
        assert_ne!(user.password_hash, "Passw0rd");
    }

    #[tokio::test]
    async fn test_create_admin_and_duplicate() {
        let users = service();
        let mut request = create_request("Root", "root@x.com");
        request.role = Some(Role::Admin);
        assert_eq!(users.create_user(request).await.unwrap().role, Role::Admin);

        assert!(matches!(
            users.create_user(create_request("Other", "root@x.com")).await,
            Err(AppError::DuplicateIdentity)
        ));
    }

    #[tokio::test]
    async fn test_update_user() {
        let users = service();
        let bob = users.create_user(create_request("Bob", "bob@x.com")).await.unwrap();
        users.create_user(create_request("Carol", "carol@x.com")).await.unwrap();

        assert!(matches!(
            users.update_user(bob.id, UpdateUserRequest::default()).await,
            Err(AppError::Validation { .. })
        ));

        let taken = UpdateUserRequest {
            email: Some("carol@x.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            users.update_user(bob.id, taken).await,
            Err(AppError::DuplicateIdentity)
        ));

        // Keeping one's own email is not a conflict
        let same = UpdateUserRequest {
            email: Some("bob@x.com".to_string()),
            name: Some("Robert".to_string()),
            ..Default::default()
        };
        let updated = users.update_user(bob.id, same).await.unwrap();
        assert_eq!(updated.name, "Robert");

        let password = UpdateUserRequest {
            password: Some("N3wPassword".to_string()),
            ..Default::default()
        };
        let updated = users.update_user(bob.id, password).await.unwrap();
        assert_ne!(updated.password_hash, bob.password_hash);
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_user() {
        let users = service();
        let rename = UpdateUserRequest {
            name: Some("Ghost".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            users.update_user(Uuid::new_v4(), rename).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            users.delete_user(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_query_users() {
        let users = service();
        for name in ["Ann", "Ben", "Cat"] {
            users
                .create_user(create_request(name, &format!("{}@x.com", name.to_lowercase())))
                .await
                .unwrap();
        }

        let params = UserListParams {
            sort_by: Some(SortField::Name),
            sort_order: Some(SortOrder::Desc),
            limit: Some(2),
            ..Default::default()
        };
        let page = users.query_users(&params.into()).await.unwrap();

        assert_eq!(page.total_results, 3);
        assert_eq!(page.total_pages, 2);
        let names: Vec<_> = page.results.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Cat", "Ben"]);
    }

    #[test]
    fn test_list_params_validation() {
        let bad = UserListParams {
            limit: Some(500),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(UserListParams::default().validate().is_ok());
    }
}
