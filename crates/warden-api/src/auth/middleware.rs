/// Bearer authentication for protecting routes
///
/// `require_access_token` verifies the access token through the shared
/// `AuthService` (signature, kind, expiry, revocation) and adds an
/// `AuthenticatedUser` to request extensions. `require_role` is a thin guard
/// layered on top of it.
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use warden_core::{Identity, Role, TokenKind, WardenError};

/// Authenticated caller extracted from a verified access token
///
/// Handlers read it with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
    /// Token identifier, used as the revocation key
    pub token_id: Uuid,
}

impl AuthenticatedUser {
    /// Admins satisfy every role requirement
    pub fn has_role(&self, required: Role) -> bool {
        self.role == Role::Admin || self.role == required
    }
}

impl From<Identity> for AuthenticatedUser {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            role: identity.role,
            token_id: identity.token_id,
        }
    }
}

/// Extract the raw token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The bearer token, or `Unauthorized` (audited) when none was presented
pub fn require_bearer(headers: &HeaderMap) -> Result<&str, AppError> {
    bearer_token(headers).ok_or_else(|| {
        audit_log(&AuditEvent::InvalidToken {
            reason: "missing_bearer".to_string(),
            client: ClientInfo::from_headers(headers),
        });
        AppError::Unauthorized
    })
}

/// Convert a core error into an API error, auditing token rejections
///
/// Every rejection reason becomes the same `Unauthorized` error.
pub fn reject(err: WardenError, headers: &HeaderMap) -> AppError {
    if let WardenError::Unauthorized(rejection) = &err {
        audit_log(&AuditEvent::InvalidToken {
            reason: rejection.reason().to_string(),
            client: ClientInfo::from_headers(headers),
        });
    }
    err.into()
}

/// Verify the bearer token as `kind`
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    kind: TokenKind,
) -> Result<Identity, AppError> {
    let token = require_bearer(headers)?;
    state
        .auth
        .verify(token, kind)
        .await
        .map_err(|e| reject(e, headers))
}

/// Middleware that requires a valid, unrevoked access token
///
/// ```ignore
/// let protected = Router::new()
///     .route("/verify", get(verify_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require_access_token));
/// ```
pub async fn require_access_token(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authenticate(&state, request.headers(), TokenKind::Access).await?;
    request
        .extensions_mut()
        .insert(AuthenticatedUser::from(identity));

    Ok(next.run(request).await)
}

/// Type alias for role middleware future
type RoleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AppError>> + Send>>;

/// Middleware factory for role-based access control
///
/// Must run after `require_access_token`.
///
/// ```ignore
/// let admin = Router::new()
///     .route("/admin", get(admin_handler))
///     .route_layer(middleware::from_fn(require_role(Role::Admin)))
///     .route_layer(middleware::from_fn_with_state(state, require_access_token));
/// ```
pub fn require_role(
    required: Role,
) -> impl Fn(Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            let user = request
                .extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or(AppError::Unauthorized)?;

            if !user.has_role(required) {
                audit_log(&AuditEvent::AccessDenied {
                    user_id: user.user_id,
                    resource: request.uri().path().to_string(),
                    required_role: required,
                    client: ClientInfo::from_headers(request.headers()),
                });
                return Err(AppError::Forbidden);
            }

            Ok(next.run(request).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_router_for_testing_with_state;
    use axum::{http::StatusCode, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;
    use warden_core::Registration;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwdw==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_admin_satisfies_any_role() {
        let admin = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
            token_id: Uuid::new_v4(),
        };
        let user = AuthenticatedUser {
            role: Role::User,
            ..admin.clone()
        };

        assert!(admin.has_role(Role::User));
        assert!(admin.has_role(Role::Admin));
        assert!(user.has_role(Role::User));
        assert!(!user.has_role(Role::Admin));
    }

    async fn whoami(Extension(user): Extension<AuthenticatedUser>) -> String {
        user.role.to_string()
    }

    async fn token_for(state: &AppState, username: &str, role: &str) -> String {
        state
            .auth
            .register(Registration {
                username: Some(username.to_string()),
                password: Some("pw".to_string()),
                email: Some(format!("{username}@ex.com")),
                role: Some(role.to_string()),
            })
            .await
            .unwrap();
        state.auth.login(username, "pw").await.unwrap().tokens.access.token
    }

    fn guarded(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/admin", get(whoami))
            .route_layer(middleware::from_fn(require_role(Role::Admin)))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_access_token,
            ))
            .with_state(state)
    }

    async fn status(app: Router, token: Option<&str>) -> StatusCode {
        let mut request = axum::http::Request::builder().uri("/admin");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_role_guard() {
        let (_, state) = create_router_for_testing_with_state();
        let admin = token_for(&state, "root", "admin").await;
        let user = token_for(&state, "alice", "user").await;

        assert_eq!(status(guarded(state.clone()), Some(&admin)).await, StatusCode::OK);
        assert_eq!(status(guarded(state.clone()), Some(&user)).await, StatusCode::FORBIDDEN);
        assert_eq!(status(guarded(state.clone()), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(guarded(state), Some("not-a-token")).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
