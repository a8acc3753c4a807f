//! Authentication API handlers
//!
//! Registration, login, logout, token refresh and the caller's own profile.
//! Every outcome is recorded in the audit log.

use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::auth::{
    AuthPayload, AuthenticatedUser, LoginRequest, RefreshTokenRequest, RegisterRequest, TokenPair,
};
use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, Extension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use userhub_core::User;
use utoipa::ToSchema;

/// Payload of a successful refresh
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokensPayload {
    pub tokens: TokenPair,
}

/// Register a new user account
///
/// New accounts always get role `user` and are signed in immediately.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = AuthPayload),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email already taken", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<ApiResponse<AuthPayload>, AppError> {
    let email = request.email.clone();
    match state.auth.register(request).await {
        Ok(payload) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                user_id: payload.user.id,
                email: payload.user.email.clone(),
                role: payload.user.role.to_string(),
                client: ClientInfo::from_headers(&headers),
            });
            Ok(ApiResponse::created("Registration successful", payload))
        }
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: e.to_string(),
                client: ClientInfo::from_headers(&headers),
            });
            Err(e)
        }
    }
}

/// Login with email and password
///
/// An unknown email and a wrong password get the same answer.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthPayload),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Incorrect email or password", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<AuthPayload>, AppError> {
    match state.auth.login(&request.email, &request.password).await {
        Ok(payload) => {
            audit_log(&AuditEvent::LoginSuccess {
                user_id: payload.user.id,
                email: payload.user.email.clone(),
                client: ClientInfo::from_headers(&headers),
            });
            Ok(ApiResponse::ok("Login successful", payload))
        }
        Err(e) => {
            audit_log(&AuditEvent::LoginFailure {
                email: request.email,
                reason: e.to_string(),
                client: ClientInfo::from_headers(&headers),
            });
            Err(e)
        }
    }
}

/// Logout
///
/// Revokes the given refresh token. Access tokens already issued stay valid
/// until they expire.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Logout successful"),
        (status = 400, description = "Missing refresh token", body = crate::error::ApiError),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RefreshTokenRequest>,
) -> Result<ApiResponse<()>, AppError> {
    state.auth.logout(&request.refresh_token);
    audit_log(&AuditEvent::Logout {
        client: ClientInfo::from_headers(&headers),
    });

    Ok(ApiResponse::message("Logout successful"))
}

/// Exchange a refresh token for a new token pair
///
/// The presented refresh token is revoked; reusing it fails.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh-tokens",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Token refresh successful", body = TokensPayload),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RefreshTokenRequest>,
) -> Result<ApiResponse<TokensPayload>, AppError> {
    match state.auth.refresh_auth(&request.refresh_token).await {
        Ok(tokens) => {
            audit_log(&AuditEvent::TokenRefresh {
                client: ClientInfo::from_headers(&headers),
            });
            Ok(ApiResponse::ok(
                "Token refresh successful",
                TokensPayload { tokens },
            ))
        }
        Err(e) => {
            audit_log(&AuditEvent::TokenRefreshFailure {
                reason: e.to_string(),
                client: ClientInfo::from_headers(&headers),
            });
            Err(e)
        }
    }
}

/// Get current user profile
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Profile retrieved successfully", body = User),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<ApiResponse<User>, AppError> {
    let profile = state.auth.current_user(user.identity()).await?;
    Ok(ApiResponse::ok("Profile retrieved successfully", profile))
}
