//! Security audit logging for authentication events
//!
//! Provides structured audit logging for authentication-related events:
//! logins, logouts, registrations, token refreshes and access control
//! failures, plus administrative changes to user accounts.
//!
//! Events go to the `audit` tracing target at INFO, so a subscriber can
//! route them separately (`RUST_LOG=audit=info`).
//!
//! ```ignore
//! audit_log(&AuditEvent::Logout {
//!     client: ClientInfo::from_headers(&headers),
//! });
//! ```

use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Request origin attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client IP address (from proxy headers)
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful user login
    LoginSuccess {
        user_id: Uuid,
        email: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Failed login attempt
    LoginFailure {
        email: String,
        reason: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Successful user registration
    RegistrationSuccess {
        user_id: Uuid,
        email: String,
        role: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Failed registration attempt
    RegistrationFailure {
        email: String,
        reason: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Refresh token revoked by the client
    Logout {
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Refresh token exchanged for a new pair
    TokenRefresh {
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Refresh attempt rejected
    TokenRefreshFailure {
        reason: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Authenticated request rejected for its role
    AccessDenied {
        subject_id: Option<String>,
        role: Option<String>,
        required_roles: String,
        resource: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Missing, malformed, invalid, expired or revoked bearer token
    InvalidToken {
        reason: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Account created, changed or removed by an administrator
    UserAdministration {
        actor_id: String,
        user_id: Uuid,
        action: String,
    },
}

impl AuditEvent {
    /// Short human-readable summary used as the log message
    pub fn summary(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::Logout { .. } => "Logout",
            AuditEvent::TokenRefresh { .. } => "Token refreshed",
            AuditEvent::TokenRefreshFailure { .. } => "Token refresh rejected",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::UserAdministration { .. } => "User administration",
        }
    }

    /// Request origin, when the event came from a client request
    pub fn client(&self) -> Option<&ClientInfo> {
        match self {
            AuditEvent::LoginSuccess { client, .. }
            | AuditEvent::LoginFailure { client, .. }
            | AuditEvent::RegistrationSuccess { client, .. }
            | AuditEvent::RegistrationFailure { client, .. }
            | AuditEvent::Logout { client }
            | AuditEvent::TokenRefresh { client }
            | AuditEvent::TokenRefreshFailure { client, .. }
            | AuditEvent::AccessDenied { client, .. }
            | AuditEvent::InvalidToken { client, .. } => Some(client),
            AuditEvent::UserAdministration { .. } => None,
        }
    }

    /// Failure reason, for events that carry one
    fn reason(&self) -> Option<&str> {
        match self {
            AuditEvent::LoginFailure { reason, .. }
            | AuditEvent::RegistrationFailure { reason, .. }
            | AuditEvent::TokenRefreshFailure { reason, .. }
            | AuditEvent::InvalidToken { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Emit an audit event at INFO with target `"audit"`
///
/// The whole event is attached as a JSON string in the `event` field so log
/// aggregators can parse it; the client address and failure reason are also
/// lifted into their own fields for filtering. Example `event` value:
///
/// ```json
/// {
///   "event_type": "login_failure",
///   "email": "user@example.com",
///   "reason": "Incorrect email or password",
///   "ip_address": "192.168.1.1"
/// }
/// ```
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let client = event.client();

    info!(
        target: "audit",
        timestamp = %Utc::now(),
        event = %event_json,
        reason = event.reason(),
        ip_address = client.and_then(|c| c.ip_address.as_deref()),
        user_agent = client.and_then(|c| c.user_agent.as_deref()),
        "{}",
        event.summary()
    );
}

/// Extract client IP address from request headers
///
/// Checks `X-Forwarded-For` (first hop) and then `X-Real-IP`. The socket
/// address is not available here.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .map(str::to_string)
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
