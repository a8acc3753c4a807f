//! Authentication service layer
//!
//! Orchestrates registration, login, logout and token refresh over the
//! credential verifier, the token service and the user directory. Every
//! call is independent; no per-session state lives here.

use super::jwt::TokenKind;
use super::password::{validate_password_strength, CredentialVerifier};
use super::token::{TokenPair, TokenService};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use userhub_core::{Identity, NewUser, User, UserDirectory};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Body of logout and refresh requests
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// User profile together with a freshly issued token pair
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthPayload {
    pub user: User,
    pub tokens: TokenPair,
}

/// Authentication service
pub struct AuthService {
    directory: Arc<dyn UserDirectory>,
    tokens: Arc<TokenService>,
    credentials: CredentialVerifier,
}

impl AuthService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        tokens: Arc<TokenService>,
        credentials: CredentialVerifier,
    ) -> Self {
        Self {
            directory,
            tokens,
            credentials,
        }
    }

    /// Register a new account with role `user` and sign it in
    ///
    /// Fails with `DuplicateIdentity` if the email is taken and with
    /// `Validation` if the password is too weak.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthPayload, AppError> {
        validate_password_strength(&request.password)?;

        if self.directory.email_taken(&request.email, None).await? {
            return Err(AppError::DuplicateIdentity);
        }

        let password_hash = self.credentials.hash_blocking(request.password).await?;

        // A concurrent registration can still win the race; `create` reports it
        let user = self
            .directory
            .create(NewUser::new(request.name, &request.email, password_hash))
            .await?;
        let tokens = self.tokens.generate_auth_tokens(&user.identity())?;

        tracing::debug!(user_id = %user.id, "User registered");
        Ok(AuthPayload { user, tokens })
    }

    /// Authenticate with email and password
    ///
    /// An unknown email and a wrong password produce the same
    /// `InvalidCredentials` error.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, AppError> {
        let user = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let matches = self
            .credentials
            .matches_blocking(password.to_string(), user.password_hash.clone())
            .await?;
        if !matches {
            return Err(AppError::InvalidCredentials);
        }

        let tokens = self.tokens.generate_auth_tokens(&user.identity())?;
        Ok(AuthPayload { user, tokens })
    }

    /// Revoke a refresh token.
    ///
    /// Access tokens issued alongside it stay valid until they expire.
    pub fn logout(&self, refresh_token: &str) {
        self.tokens.blacklist_token(refresh_token);
    }

    /// Exchange a refresh token for a new pair
    ///
    /// Every failure (invalid, expired, revoked or reused token, or a
    /// subject that no longer exists) is reported as `InvalidRefreshToken`.
    pub async fn refresh_auth(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        self.rotate(refresh_token).await.map_err(|e| {
            tracing::debug!(reason = %e, "Refresh rejected");
            AppError::InvalidRefreshToken
        })
    }

    async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.tokens.verify_token(refresh_token, TokenKind::Refresh)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::TokenInvalid)?;
        let user = self
            .directory
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(self
            .tokens
            .rotate_refresh_token(refresh_token, &user.identity())?)
    }

    /// Profile of the authenticated caller
    pub async fn current_user(&self, identity: &Identity) -> Result<User, AppError> {
        let user_id = Uuid::parse_str(&identity.subject_id).map_err(|_| AppError::TokenInvalid)?;
        self.directory
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
