//! Authentication service layer
//!
//! Orchestrates registration, login, token refresh, logout and token
//! verification over the credential store, password hasher, token issuer,
//! token verifier and revocation ledger.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::password::PasswordHasher;
use crate::store::{CredentialStore, RevocationLedger};
use crate::token::{
    Identity, IssuedToken, Rejection, TokenIssuer, TokenKind, TokenPair, TokenVerifier,
};
use crate::{
    validate_email, validate_username, Result, Role, UniqueField, User, UserPublic, WardenError,
};

/// Registration input; absent and empty fields are both "missing"
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Result of a successful registration
#[derive(Debug, Clone)]
pub struct Registered {
    pub user: UserPublic,
    /// Present only when auto-login is enabled
    pub tokens: Option<TokenPair>,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: UserPublic,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    ledger: Arc<dyn RevocationLedger>,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    auto_login: bool,
    /// Verified against on unknown-user logins so both failure paths cost the same
    decoy_digest: String,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("issuer", &self.issuer)
            .field("auto_login", &self.auto_login)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Create a new authentication service
    ///
    /// Fails on an empty signing secret or invalid hashing parameters.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
        ledger: Arc<dyn RevocationLedger>,
    ) -> Result<Self> {
        let hasher = PasswordHasher::new(&config.password)?;
        let issuer = TokenIssuer::new(&config.jwt)?;
        let verifier = TokenVerifier::new(&config.jwt, ledger.clone())?;
        let decoy_digest = hasher.hash(&Uuid::new_v4().to_string())?;

        Ok(Self {
            store,
            ledger,
            hasher,
            issuer,
            verifier,
            auto_login: config.auth.auto_login,
            decoy_digest,
        })
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Register a new user
    ///
    /// Checks run in a fixed order: required fields and role, username
    /// conflict, email conflict, then format.
    pub async fn register(&self, registration: Registration) -> Result<Registered> {
        let username = required(registration.username, "username")?;
        let password = required(registration.password, "password")?;
        let email = required(registration.email, "email")?;
        let role = match registration.role {
            Some(role) => role.parse::<Role>()?,
            None => Role::default(),
        };

        if self.store.find_by_username(&username).await?.is_some() {
            return Err(WardenError::Conflict(UniqueField::Username));
        }
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(WardenError::Conflict(UniqueField::Email));
        }

        validate_username(&username)?;
        validate_email(&email)?;

        let digest = self.hasher.hash_blocking(password).await?;
        // The store re-checks uniqueness atomically; a lost race is still Conflict
        let user = self.store.insert(User::new(username, email, digest, role)).await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        let tokens = if self.auto_login {
            Some(self.issuer.issue_pair(user.id, user.role)?)
        } else {
            None
        };

        Ok(Registered {
            user: user.to_public(),
            tokens,
        })
    }

    /// Login with username and password
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        if username.is_empty() || password.is_empty() {
            return Err(WardenError::InvalidInput(
                "username and password are required".to_string(),
            ));
        }

        let Some(user) = self.store.find_by_username(username).await? else {
            self.hasher
                .verify_blocking(password.to_string(), self.decoy_digest.clone())
                .await?;
            return Err(WardenError::InvalidCredentials);
        };

        let valid = self
            .hasher
            .verify_blocking(password.to_string(), user.password_digest.clone())
            .await?;
        if !valid {
            return Err(WardenError::InvalidCredentials);
        }

        let tokens = self.issuer.issue_pair(user.id, user.role)?;
        tracing::debug!(user_id = %user.id, "Issued token pair");

        Ok(LoginOutcome {
            tokens,
            user: user.to_public(),
        })
    }

    /// Issue a new access token from a valid refresh token
    ///
    /// The refresh token itself is not rotated. The role comes from the
    /// stored user, not the refresh claims, so role changes and deletions
    /// take effect on the next refresh.
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedToken> {
        let identity = self.verifier.verify(refresh_token, TokenKind::Refresh).await?;
        let user = self
            .store
            .find_by_id(identity.user_id)
            .await?
            .ok_or(WardenError::Unauthorized(Rejection::UnknownSubject))?;

        if user.role != identity.role {
            tracing::info!(user_id = %user.id, from = %identity.role, to = %user.role, "Role changed since refresh token issuance");
        }
        self.issuer.issue_access(user.id, user.role)
    }

    /// Revoke the presented access token and, optionally, a refresh token of
    /// the same subject
    ///
    /// A refresh token that fails verification or belongs to another subject
    /// is ignored; the access token is revoked either way.
    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> Result<Identity> {
        let identity = self.verifier.verify(access_token, TokenKind::Access).await?;
        self.ledger
            .revoke(identity.token_id, identity.expires_at)
            .await?;

        if let Some(raw) = refresh_token {
            match self.verifier.verify(raw, TokenKind::Refresh).await {
                Ok(refresh) if refresh.user_id == identity.user_id => {
                    self.ledger.revoke(refresh.token_id, refresh.expires_at).await?;
                }
                Ok(_) => {
                    tracing::warn!(user_id = %identity.user_id, "Ignoring refresh token of another subject on logout");
                }
                Err(WardenError::Unauthorized(reason)) => {
                    tracing::debug!(reason = reason.reason(), "Ignoring invalid refresh token on logout");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(identity)
    }

    /// Verify a token of the required kind
    pub async fn verify(&self, token: &str, kind: TokenKind) -> Result<Identity> {
        self.verifier.verify(token, kind).await
    }

    /// Resolve an access token to the current public profile of its subject
    pub async fn current_user(&self, access_token: &str) -> Result<UserPublic> {
        let identity = self.verifier.verify(access_token, TokenKind::Access).await?;
        self.store
            .find_by_id(identity.user_id)
            .await?
            .map(|user| user.to_public())
            .ok_or_else(|| WardenError::NotFound(format!("User {}", identity.user_id)))
    }

    /// Verify a token of either kind and revoke its id
    pub async fn revoke(&self, token: &str) -> Result<Identity> {
        let identity = self.verifier.verify_any(token).await?;
        self.ledger
            .revoke(identity.token_id, identity.expires_at)
            .await?;
        Ok(identity)
    }

    /// Drop ledger entries whose tokens would have expired by `now`
    pub async fn prune_revocations(&self, now: DateTime<Utc>) -> Result<u64> {
        self.ledger.prune_expired(now).await
    }

    /// Change a user's role by username
    pub async fn set_role(&self, username: &str, role: Role) -> Result<UserPublic> {
        let user = self.find_existing(username).await?;
        Ok(self.store.set_role(user.id, role).await?.to_public())
    }

    /// Delete a user by username
    pub async fn delete_user(&self, username: &str) -> Result<UserPublic> {
        let user = self.find_existing(username).await?;
        if !self.store.delete(user.id).await? {
            return Err(WardenError::NotFound(format!("User {username}")));
        }
        Ok(user.to_public())
    }

    async fn find_existing(&self, username: &str) -> Result<User> {
        self.store
            .find_by_username(username)
            .await?
            .ok_or_else(|| WardenError::NotFound(format!("User {username}")))
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(WardenError::InvalidInput(format!("{field} is required"))),
    }
}
