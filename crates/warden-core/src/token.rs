//! Access and refresh token issuance and verification
//!
//! Tokens are JWTs signed with HMAC-SHA256. Every token carries a `kind`
//! claim so a refresh token can never stand in for an access token (and vice
//! versa), and a unique `jti` used as the revocation key.
//!
//! Verification order is fixed and the first failure wins:
//! signature/structure, kind, expiry, revocation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::store::RevocationLedger;
use crate::{Result, Role, WardenError};

/// Token kind, embedded as the `kind` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TokenKind {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "access" => Ok(TokenKind::Access),
            "refresh" => Ok(TokenKind::Refresh),
            other => Err(WardenError::InvalidInput(format!("Unknown token kind: {other}"))),
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - user ID
    pub sub: Uuid,
    /// JWT ID - unique token identifier used for revocation
    pub jti: Uuid,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    pub kind: TokenKind,
    /// Role of the subject at issuance
    pub role: Role,
}

/// Why a presented token was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("malformed token")]
    Malformed,

    #[error("expected {expected} token, found {found}")]
    WrongKind { expected: TokenKind, found: TokenKind },

    #[error("token expired")]
    Expired,

    #[error("token revoked")]
    Revoked,

    #[error("token subject no longer exists")]
    UnknownSubject,
}

impl Rejection {
    /// Short machine-readable reason for audit logs
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Malformed => "malformed",
            Rejection::WrongKind { .. } => "wrong_kind",
            Rejection::Expired => "expired",
            Rejection::Revoked => "revoked",
            Rejection::UnknownSubject => "unknown_subject",
        }
    }
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: Uuid,
    /// User the token was issued to
    pub subject: Uuid,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    /// Lifetime in seconds at issuance
    pub expires_in: u64,
}

/// Access and refresh tokens issued together
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Verified token identity handed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    pub token_id: Uuid,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

/// Signs access and refresh tokens
///
/// Stateless: issuance writes to no store.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    issuer: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(WardenError::ConfigError(
                "JWT signing secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            key: EncodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        })
    }

    /// Configured lifetime for a token kind
    pub fn ttl_secs(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        }
    }

    pub fn issue_access(&self, subject: Uuid, role: Role) -> Result<IssuedToken> {
        self.issue_at(subject, role, TokenKind::Access, Utc::now())
    }

    pub fn issue_refresh(&self, subject: Uuid, role: Role) -> Result<IssuedToken> {
        self.issue_at(subject, role, TokenKind::Refresh, Utc::now())
    }

    pub fn issue_pair(&self, subject: Uuid, role: Role) -> Result<TokenPair> {
        self.issue_pair_at(subject, role, Utc::now())
    }

    pub fn issue_access_at(
        &self,
        subject: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        self.issue_at(subject, role, TokenKind::Access, now)
    }

    pub fn issue_refresh_at(
        &self,
        subject: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        self.issue_at(subject, role, TokenKind::Refresh, now)
    }

    /// Both tokens or an error; never one without the other
    pub fn issue_pair_at(&self, subject: Uuid, role: Role, now: DateTime<Utc>) -> Result<TokenPair> {
        let access = self.issue_at(subject, role, TokenKind::Access, now)?;
        let refresh = self.issue_at(subject, role, TokenKind::Refresh, now)?;
        Ok(TokenPair { access, refresh })
    }

    fn issue_at(
        &self,
        subject: Uuid,
        role: Role,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        let ttl = self.ttl_secs(kind);
        let expires_at = i64::try_from(ttl)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| WardenError::ConfigError(format!("Token TTL out of range: {ttl}")))?;

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            kind,
            role,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| WardenError::Internal(format!("Failed to encode JWT: {e}")))?;

        Ok(IssuedToken {
            token,
            token_id: claims.jti,
            subject,
            kind,
            expires_at,
            expires_in: ttl,
        })
    }
}

/// Validates presented tokens against the signing key and revocation ledger
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
    ledger: Arc<dyn RevocationLedger>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(config: &JwtConfig, ledger: Arc<dyn RevocationLedger>) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(WardenError::ConfigError(
                "JWT signing secret must not be empty".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        // Expiry is checked after kind, against an injectable clock, with no leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ledger,
        })
    }

    /// Full verification: signature, kind, expiry, then the revocation ledger
    pub async fn verify(&self, raw: &str, required: TokenKind) -> Result<Identity> {
        self.verify_at(raw, Some(required), Utc::now()).await
    }

    /// Full verification accepting either token kind
    pub async fn verify_any(&self, raw: &str) -> Result<Identity> {
        self.verify_at(raw, None, Utc::now()).await
    }

    pub async fn verify_at(
        &self,
        raw: &str,
        required: Option<TokenKind>,
        now: DateTime<Utc>,
    ) -> Result<Identity> {
        let identity = self.check(raw, required, now)?;

        // A ledger failure is an error, never an implicit accept
        if self.ledger.is_revoked(identity.token_id).await? {
            return Err(Rejection::Revoked.into());
        }

        Ok(identity)
    }

    /// Stateless checks only (signature, kind, expiry)
    pub fn decode_at(
        &self,
        raw: &str,
        required: TokenKind,
        now: DateTime<Utc>,
    ) -> std::result::Result<Identity, Rejection> {
        self.check(raw, Some(required), now)
    }

    fn check(
        &self,
        raw: &str,
        required: Option<TokenKind>,
        now: DateTime<Utc>,
    ) -> std::result::Result<Identity, Rejection> {
        let claims = decode::<Claims>(raw, &self.key, &self.validation)
            .map_err(|_| Rejection::Malformed)?
            .claims;

        if let Some(expected) = required {
            if claims.kind != expected {
                return Err(Rejection::WrongKind {
                    expected,
                    found: claims.kind,
                });
            }
        }

        if now.timestamp() >= claims.exp {
            return Err(Rejection::Expired);
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(Rejection::Malformed)?;

        Ok(Identity {
            user_id: claims.sub,
            role: claims.role,
            token_id: claims.jti,
            kind: claims.kind,
            expires_at,
        })
    }
}
