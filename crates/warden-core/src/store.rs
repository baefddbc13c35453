//! Credential store and revocation ledger
//!
//! Both are trait objects shared across requests. The in-memory
//! implementations keep uniqueness checks and inserts under a single lock so
//! concurrent registrations cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::postgres::{self, PgCredentialStore, PgRevocationLedger};
use crate::{Result, Role, UniqueField, User, WardenError};

/// Persistence for user records
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new user; `Conflict` names the field whose uniqueness failed
    async fn insert(&self, user: User) -> Result<User>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Users ordered by creation time
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>>;

    /// Change a user's role, refreshing `updated_at`
    async fn set_role(&self, id: Uuid, role: Role) -> Result<User>;

    /// Returns whether a row was removed
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Liveness check used by readiness probes
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// A revoked token identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    pub token_id: Uuid,
    pub revoked_at: DateTime<Utc>,
    /// Natural expiry of the revoked token; only used for pruning
    pub expires_at: DateTime<Utc>,
}

/// Append-only record of invalidated token identifiers
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Idempotent; revoking an already revoked id succeeds without change
    async fn revoke(&self, token_id: Uuid, expires_at: DateTime<Utc>) -> Result<()>;

    async fn is_revoked(&self, token_id: Uuid) -> Result<bool>;

    /// Delete entries whose tokens have expired by `now`; returns the count
    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Open the configured backend and return the store/ledger pair
pub async fn connect_stores(
    config: &DatabaseConfig,
) -> Result<(Arc<dyn CredentialStore>, Arc<dyn RevocationLedger>)> {
    match config.backend {
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory stores; users and revocations are lost on restart");
            Ok((
                Arc::new(MemoryCredentialStore::new()),
                Arc::new(MemoryRevocationLedger::new()),
            ))
        }
        DatabaseBackend::Postgres => {
            let url = config.postgres_url.as_deref().ok_or_else(|| {
                WardenError::ConfigError("DATABASE_URL is required for postgres".to_string())
            })?;
            let pool = postgres::connect(url, config.pool_size).await?;
            postgres::ensure_schema(&pool).await?;
            tracing::info!("Connected to PostgreSQL credential store");
            Ok((
                Arc::new(PgCredentialStore::new(pool.clone())),
                Arc::new(PgRevocationLedger::new(pool)),
            ))
        }
    }
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// Process-local credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert(&self, user: User) -> Result<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.username == user.username) {
            return Err(WardenError::Conflict(UniqueField::Username));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(WardenError::Conflict(UniqueField::Email));
        }

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<User> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| WardenError::NotFound(format!("User {id}")))?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

/// Process-local revocation ledger
///
/// The lock is held across the write, so a `revoke` that has returned is
/// visible to every later `is_revoked`.
#[derive(Debug, Default)]
pub struct MemoryRevocationLedger {
    entries: Mutex<HashMap<Uuid, RevocationEntry>>,
}

impl MemoryRevocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl RevocationLedger for MemoryRevocationLedger {
    async fn revoke(&self, token_id: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        self.entries
            .lock()
            .await
            .entry(token_id)
            .or_insert_with(|| RevocationEntry {
                token_id,
                revoked_at: Utc::now(),
                expires_at,
            });
        Ok(())
    }

    async fn is_revoked(&self, token_id: Uuid) -> Result<bool> {
        Ok(self.entries.lock().await.contains_key(&token_id))
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}
