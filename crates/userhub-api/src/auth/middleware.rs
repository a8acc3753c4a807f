/// Authentication middleware for protecting routes
///
/// Stage one (`auth_middleware`) extracts the bearer token, verifies it as an
/// access token and attaches the identity to the request extensions. Stage
/// two (`require_roles`) checks the attached identity against a role list.
use super::token::TokenService;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use userhub_core::{Identity, Role};

/// Authenticated caller, added to request extensions by [`auth_middleware`]
///
/// Extract it in handlers with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Identity);

impl AuthenticatedUser {
    pub fn identity(&self) -> &Identity {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.0.is_admin()
    }
}

/// Read the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AppError::TokenMissing)?
        .to_str()
        .map_err(|_| AppError::TokenMalformed)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::TokenMalformed)
}

/// Establish the caller's identity from request headers
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<Identity, AppError> {
    let token = bearer_token(headers)?;
    Ok(tokens.verify_access_token(token)?)
}

/// Check that an established identity holds one of `roles`
///
/// Without an identity this fails closed with `Unauthenticated`.
pub fn authorize<'a>(
    identity: Option<&'a Identity>,
    roles: &[Role],
) -> Result<&'a Identity, AppError> {
    let identity = identity.ok_or(AppError::Unauthenticated)?;
    if roles.contains(&identity.role) {
        Ok(identity)
    } else {
        Err(AppError::InsufficientPermissions)
    }
}

/// Authentication middleware that requires a valid access token
///
/// # Usage
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use userhub_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .route_layer(middleware::from_fn_with_state(token_service, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = match authenticate(request.headers(), &tokens) {
        Ok(identity) => identity,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: e.to_string(),
                client: ClientInfo::from_headers(request.headers()),
            });
            return Err(e);
        }
    };

    request.extensions_mut().insert(AuthenticatedUser(identity));
    Ok(next.run(request).await)
}

/// Type alias for role middleware future
type RoleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AppError>> + Send>>;

/// Middleware factory for role-based access control
///
/// Must be layered inside [`auth_middleware`]; a request that reaches it
/// without an identity is rejected with `Unauthenticated`.
///
/// ```ignore
/// let admin = Router::new()
///     .route("/users", get(list_users))
///     .route_layer(middleware::from_fn(require_roles(&[Role::Admin])))
///     .route_layer(middleware::from_fn_with_state(tokens, auth_middleware));
/// ```
pub fn require_roles(
    roles: &'static [Role],
) -> impl Fn(Request, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let identity = request
                .extensions()
                .get::<AuthenticatedUser>()
                .map(AuthenticatedUser::identity);

            if let Err(e) = authorize(identity, roles) {
                let required_roles = roles
                    .iter()
                    .map(Role::as_str)
                    .collect::<Vec<_>>()
                    .join(",");
                audit_log(&AuditEvent::AccessDenied {
                    subject_id: identity.map(|i| i.subject_id.clone()),
                    role: identity.map(|i| i.role.to_string()),
                    required_roles,
                    resource: request.uri().path().to_string(),
                    client: ClientInfo::from_headers(request.headers()),
                });
                return Err(e);
            }

            Ok(next.run(request).await)
        })
    }
}
