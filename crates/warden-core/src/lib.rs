//! Warden Core - Domain models, stores, and the token authority
//!
//! This crate defines the core of the Warden credential service:
//! - User accounts and roles
//! - Common error types
//! - Password hashing (Argon2id with a deployment pepper)
//! - Access/refresh token issuance and verification
//! - Credential store and revocation ledger (in-memory and PostgreSQL)
//! - The `AuthService` orchestrating register/login/refresh/logout
//! - Configuration management

pub mod config;
pub mod password;
pub mod postgres;
pub mod service;
pub mod store;
pub mod token;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseBackend, DatabaseConfig, JwtConfig};
pub use password::{PasswordConfig, PasswordHasher};
pub use postgres::{PgCredentialStore, PgRevocationLedger};
pub use service::{AuthService, LoginOutcome, Registered, Registration};
pub use store::{
    connect_stores, CredentialStore, MemoryCredentialStore, MemoryRevocationLedger,
    RevocationEntry, RevocationLedger,
};
pub use token::{Claims, Identity, IssuedToken, Rejection, TokenIssuer, TokenKind, TokenPair, TokenVerifier};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Warden operations
#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} already exists")]
    Conflict(UniqueField),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] Rejection),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, WardenError>;

/// Column whose uniqueness constraint rejected a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Username => write!(f, "Username"),
            Self::Email => write!(f, "Email"),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// Maximum username length in characters
pub const MAX_USERNAME_LEN: usize = 80;

/// Maximum email length in characters
pub const MAX_EMAIL_LEN: usize = 120;

/// User role
///
/// - User: ordinary account (the default)
/// - Admin: may pass admin-only route guards
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(WardenError::InvalidInput(format!("Unknown role: {other}"))),
        }
    }
}

/// User account record as owned by the credential store
///
/// `password_digest` is never serialized; use [`User::to_public`] for anything
/// leaving the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_digest: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh identifier and timestamps
    pub fn new(username: String, email: String, password_digest: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_digest,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert user to public representation (without the digest)
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public user representation (safe for API responses and collaborators)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserPublic {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Validation
// ============================================================================

/// Check that a username is 1..=80 ASCII alphanumeric characters
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(WardenError::InvalidInput(format!(
            "Username must be 1-{MAX_USERNAME_LEN} characters"
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(WardenError::InvalidInput(
            "Username must contain only letters and numbers".to_string(),
        ));
    }
    Ok(())
}

/// Check that an email has the basic `local@domain.tld` shape
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || WardenError::InvalidInput("Invalid email address".to_string());

    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    // At least one dot with something on both sides
    match domain.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < domain.len() => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_conversion() {
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("ADMIN".parse::<Role>().is_err());
        assert!("editor".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_user_to_public_hides_digest() {
        let user = User::new(
            "alice".to_string(),
            "a@ex.com".to_string(),
            "$argon2id$secret".to_string(),
            Role::User,
        );

        let public = user.to_public();
        assert_eq!(public.id, user.id);
        assert_eq!(public.username, "alice");

        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password"));

        // The full record skips the digest as well
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("Alice42").is_ok());

        assert!(validate_username("").is_err());
        assert!(validate_username("al ice").is_err());
        assert!(validate_username("alice_1").is_err());
        assert!(validate_username("al@ce").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@ex.com").is_ok());
        assert!(validate_email("first.last@mail.example.org").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("@ex.com").is_err());
        assert!(validate_email("a@excom").is_err());
        assert!(validate_email("a@.com").is_err());
        assert!(validate_email("a@ex.").is_err());
        assert!(validate_email("a@b@ex.com").is_err());
        assert!(validate_email("a b@ex.com").is_err());
    }

    #[test]
    fn test_conflict_message_names_field() {
        let err = WardenError::Conflict(UniqueField::Email);
        assert_eq!(err.to_string(), "Email already exists");
    }
}
