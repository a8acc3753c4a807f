//! User administration handlers
//!
//! Mounted behind authentication and the `admin` role gate.

use crate::audit::{audit_log, AuditEvent};
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::users::{CreateUserRequest, UpdateUserRequest, UserListParams};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};
use std::sync::Arc;
use userhub_core::{User, UserPage};
use uuid::Uuid;

fn parse_user_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::validation("Invalid user id"))
}

fn record(actor: &AuthenticatedUser, user_id: Uuid, action: &str) {
    audit_log(&AuditEvent::UserAdministration {
        actor_id: actor.identity().subject_id.clone(),
        user_id,
        action: action.to_string(),
    });
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = crate::error::ApiError),
        (status = 409, description = "Email already taken", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let user = state.users.create_user(request).await?;
    record(&actor, user.id, "create");
    Ok(ApiResponse::created("User created successfully", user))
}

/// List users with filtering, sorting and pagination
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(UserListParams),
    responses(
        (status = 200, description = "Users retrieved successfully", body = UserPage),
        (status = 400, description = "Invalid query", body = crate::error::ApiError),
        (status = 403, description = "Insufficient permissions", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(params): ValidatedQuery<UserListParams>,
) -> Result<ApiResponse<UserPage>, AppError> {
    let page = state.users.query_users(&params.into()).await?;
    Ok(ApiResponse::ok("Users retrieved successfully", page))
}

/// Get a user by id
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id (UUID)")),
    responses(
        (status = 200, description = "User retrieved successfully", body = User),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<User>, AppError> {
    let user = state.users.get_user(parse_user_id(&id)?).await?;
    Ok(ApiResponse::ok("User retrieved successfully", user))
}

/// Update a user
#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id (UUID)")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
        (status = 409, description = "Email already taken", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let user = state.users.update_user(parse_user_id(&id)?, request).await?;
    record(&actor, user.id, "update");
    Ok(ApiResponse::ok("User updated successfully", user))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id (UUID)")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user = state.users.delete_user(parse_user_id(&id)?).await?;
    record(&actor, user.id, "delete");
    Ok(StatusCode::NO_CONTENT)
}
