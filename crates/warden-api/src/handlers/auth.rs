//! Authentication API handlers
//!
//! Register, login, refresh, logout and verify. Token-bearing requests use
//! `Authorization: Bearer <token>`; the refresh endpoint expects the refresh
//! token there, every other endpoint an access token.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::auth::{reject, require_bearer, AuthenticatedUser};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use warden_core::{Registration, UserPublic, WardenError};

const TOKEN_TYPE: &str = "Bearer";

/// User registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// 1-80 ASCII letters and digits
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    /// "user" (default) or "admin"
    pub role: Option<String>,
}

/// Registration response
///
/// Tokens are included only when auto-login is enabled.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub user: UserPublic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// User login request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Login response with both tokens
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub user: UserPublic,
}

/// Refresh response; the refresh token is not rotated
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Optional logout body
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Refresh token of the same user to revoke alongside the access token
    pub refresh_token: Option<String>,
}

/// Logout response (empty object)
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {}

/// Token verification response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub user: UserPublic,
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Missing or invalid field", body = crate::error::ApiError),
        (status = 409, description = "Username or email already exists", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let client = ClientInfo::from_headers(&headers);
    let Json(request) = payload.inspect_err(|e| {
        audit_log(&AuditEvent::RegistrationFailure {
            username: None,
            reason: e.body_text(),
            client: client.clone(),
        });
    })?;

    let username = request.username.clone();
    let registered = state
        .auth
        .register(Registration {
            username: request.username,
            password: request.password,
            email: request.email,
            role: request.role,
        })
        .await
        .inspect_err(|e| {
            audit_log(&AuditEvent::RegistrationFailure {
                username: username.clone(),
                reason: e.to_string(),
                client: client.clone(),
            });
        })?;

    audit_log(&AuditEvent::RegistrationSuccess {
        user_id: registered.user.id,
        username: registered.user.username.clone(),
        role: registered.user.role,
        client,
    });

    let (access_token, refresh_token, token_type, expires_in) = match registered.tokens {
        Some(pair) => (
            Some(pair.access.token),
            Some(pair.refresh.token),
            Some(TOKEN_TYPE.to_string()),
            Some(pair.access.expires_in),
        ),
        None => (None, None, None, None),
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: registered.user,
            access_token,
            refresh_token,
            token_type,
            expires_in,
        }),
    ))
}

/// Login with username and password
///
/// Unknown users and wrong passwords get the same 401 response.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing field", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let client = ClientInfo::from_headers(&headers);
    let username = request.username.unwrap_or_default();
    let password = request.password.unwrap_or_default();

    let outcome = match state.auth.login(&username, &password).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if matches!(e, WardenError::InvalidCredentials | WardenError::InvalidInput(_)) {
                audit_log(&AuditEvent::LoginFailure {
                    username,
                    reason: e.to_string(),
                    client,
                });
            }
            return Err(e.into());
        }
    };

    audit_log(&AuditEvent::LoginSuccess {
        user_id: outcome.user.id,
        username: outcome.user.username.clone(),
        client,
    });

    Ok(Json(LoginResponse {
        access_token: outcome.tokens.access.token,
        refresh_token: outcome.tokens.refresh.token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: outcome.tokens.access.expires_in,
        user: outcome.user,
    }))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New access token issued", body = RefreshResponse),
        (status = 401, description = "Missing or invalid refresh token", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = require_bearer(&headers)?;
    let access = state
        .auth
        .refresh(token)
        .await
        .map_err(|e| reject(e, &headers))?;

    audit_log(&AuditEvent::TokenRefresh {
        user_id: access.subject,
        client: ClientInfo::from_headers(&headers),
    });

    Ok(Json(RefreshResponse {
        access_token: access.token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: access.expires_in,
    }))
}

/// Revoke the presented access token (and optionally a refresh token)
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body(content = LogoutRequest, description = "Optional; refresh token to revoke as well"),
    responses(
        (status = 200, description = "Logged out", body = LogoutResponse),
        (status = 401, description = "Missing or invalid access token", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let token = require_bearer(&headers)?;
    let refresh_token = body.and_then(|Json(b)| b.refresh_token);

    let identity = state
        .auth
        .logout(token, refresh_token.as_deref())
        .await
        .map_err(|e| reject(e, &headers))?;

    audit_log(&AuditEvent::Logout {
        user_id: identity.user_id,
        token_id: identity.token_id,
        refresh_supplied: refresh_token.is_some(),
        client: ClientInfo::from_headers(&headers),
    });

    Ok(Json(LogoutResponse::default()))
}

/// Return the profile of the access token's subject
///
/// Collaborating services call this to validate a presented token.
#[utoipa::path(
    get,
    path = "/api/v1/auth/verify",
    tag = "auth",
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Missing or invalid access token", body = crate::error::ApiError),
        (status = 404, description = "Token subject no longer exists", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .auth
        .store()
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    Ok(Json(VerifyResponse {
        user: record.to_public(),
    }))
}
