//! Security audit logging for authentication events
//!
//! Every event is logged at INFO level with the "audit" target so it can be
//! routed separately from application logs. The full event is attached as a
//! JSON field; passwords, digests and raw tokens are never part of an event.
//!
//! Author: hephaex@gmail.com

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use warden_core::Role;

/// Request metadata attached to audit events
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
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
    RegistrationSuccess {
        user_id: Uuid,
        username: String,
        role: Role,
        #[serde(flatten)]
        client: ClientInfo,
    },

    RegistrationFailure {
        username: Option<String>,
        reason: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    LoginSuccess {
        user_id: Uuid,
        username: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Failed login; the reason stays in the log, clients see one generic error
    LoginFailure {
        username: String,
        reason: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    TokenRefresh {
        user_id: Uuid,
        #[serde(flatten)]
        client: ClientInfo,
    },

    Logout {
        user_id: Uuid,
        token_id: Uuid,
        refresh_supplied: bool,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Missing, malformed, wrong-kind, expired or revoked token
    InvalidToken {
        reason: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Authenticated user lacked the role a route requires
    AccessDenied {
        user_id: Uuid,
        resource: String,
        required_role: Role,
        #[serde(flatten)]
        client: ClientInfo,
    },
}

impl AuditEvent {
    fn summary(&self) -> (&'static str, Option<Uuid>, &ClientInfo) {
        match self {
            AuditEvent::RegistrationSuccess { user_id, client, .. } => {
                ("Registration successful", Some(*user_id), client)
            }
            AuditEvent::RegistrationFailure { client, .. } => ("Registration failed", None, client),
            AuditEvent::LoginSuccess { user_id, client, .. } => {
                ("Login successful", Some(*user_id), client)
            }
            AuditEvent::LoginFailure { client, .. } => ("Login failed", None, client),
            AuditEvent::TokenRefresh { user_id, client } => {
                ("Token refresh", Some(*user_id), client)
            }
            AuditEvent::Logout { user_id, client, .. } => ("User logout", Some(*user_id), client),
            AuditEvent::InvalidToken { client, .. } => ("Invalid token", None, client),
            AuditEvent::AccessDenied { user_id, client, .. } => {
                ("Access denied", Some(*user_id), client)
            }
        }
    }
}

/// Log a security audit event with structured fields
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let (message, user_id, client) = event.summary();

    info!(
        target: "audit",
        event = %event_json,
        user_id = ?user_id,
        ip_address = ?client.ip_address,
        user_agent = ?client.user_agent,
        "{message}"
    );
}

/// Extract the client IP from proxy headers
///
/// Takes the first hop of X-Forwarded-For, then X-Real-IP.
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_ip) = xff.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(first_ip.to_string());
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
