//! API error handling
//!
//! Every failure a handler can report is one [`AppError`] variant. At the
//! request boundary it is serialized into the uniform error envelope
//! `{success: false, code, message, details?, timestamp}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use userhub_core::DirectoryError;
use utoipa::ToSchema;

use crate::auth::password::PasswordError;
use crate::auth::token::TokenError;

/// Error envelope returned to clients
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always `false`
    pub success: bool,
    /// Stable machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details (validation failures)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Email already taken")]
    DuplicateIdentity,

    #[error("Please authenticate")]
    TokenMissing,

    #[error("Missing or invalid authentication token")]
    TokenMalformed,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("User not authenticated")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database operation failed: {0}")]
    Database(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenMissing
            | AppError::TokenMalformed
            | AppError::TokenInvalid
            | AppError::TokenExpired
            | AppError::TokenRevoked
            | AppError::Unauthenticated
            | AppError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::DuplicateIdentity => StatusCode::CONFLICT,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::DuplicateIdentity => "DUPLICATE_IDENTITY",
            AppError::TokenMissing => "TOKEN_MISSING",
            AppError::TokenMalformed => "TOKEN_MALFORMED",
            AppError::TokenInvalid => "TOKEN_INVALID",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::TokenRevoked => "TOKEN_REVOKED",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AppError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Message safe to show to the caller; server-side details stay in the logs
    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::Database(_) => "Database operation failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let mut body = ApiError::new(self.code(), self.public_message());
        if let AppError::Validation {
            details: Some(details),
            ..
        } = self
        {
            body = body.with_details(details);
        }

        (status, Json(body)).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AppError::TokenInvalid,
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Revoked => AppError::TokenRevoked,
            TokenError::Issue(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound => AppError::NotFound("User not found".to_string()),
            DirectoryError::EmailTaken => AppError::DuplicateIdentity,
            DirectoryError::Backend(msg) => AppError::Database(msg),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooWeak(msg) => AppError::validation(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation {
            message: "Validation failed".to_string(),
            details: serde_json::to_value(&errors).ok(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_classes() {
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenRevoked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidRefreshToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InsufficientPermissions.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::DuplicateIdentity.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::validation("x").status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_expired_and_revoked_messages_are_distinct() {
        assert_ne!(
            AppError::TokenExpired.to_string(),
            AppError::TokenRevoked.to_string()
        );
        assert_ne!(
            AppError::TokenExpired.to_string(),
            AppError::TokenInvalid.to_string()
        );
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(
            AppError::from(TokenError::Revoked),
            AppError::TokenRevoked
        ));
        assert!(matches!(
            AppError::from(DirectoryError::EmailTaken),
            AppError::DuplicateIdentity
        ));
        assert!(matches!(
            AppError::from(PasswordError::TooWeak("weak")),
            AppError::Validation { .. }
        ));
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let response = AppError::InsufficientPermissions.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "INSUFFICIENT_PERMISSIONS");
        assert_eq!(json["message"], "Insufficient permissions");
        assert!(json["timestamp"].is_string());
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_internal_details_are_not_leaked() {
        let json = body_json(AppError::Database("connection refused".into()).into_response()).await;
        assert_eq!(json["message"], "Database operation failed");
        assert!(!json.to_string().contains("connection refused"));
    }
}
