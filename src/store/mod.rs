//! Document store collaborator.
//!
//! The flows only ever see these traits. Each trait covers one collection
//! (`deviceIds`, `classes`, `users`) plus the session table used by the HTTP
//! layer. Two backends implement all of them:
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`, used by the server.
//! - [`MemoryStore`]: process-local maps behind a `tokio` lock, used by tests
//!   and local runs without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::attendance::model::{Caller, ClassRecord, DeviceBinding, NewClass, UserProfile};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of the atomic check-in write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckInRecord {
    CheckedIn { checked_in_count: i64 },
    AlreadyCheckedIn,
    ClassNotFound,
}

#[async_trait]
pub trait DeviceBindings: Send + Sync {
    async fn get_binding(&self, fingerprint: &str) -> Result<Option<DeviceBinding>, StoreError>;

    /// First write wins: returns `false` and leaves the row alone when the
    /// fingerprint is already bound.
    async fn bind_device(&self, fingerprint: &str, email: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait Classes: Send + Sync {
    async fn create_class(&self, class: NewClass) -> Result<ClassRecord, StoreError>;

    async fn get_class(&self, class_id: &str) -> Result<Option<ClassRecord>, StoreError>;

    /// Classes the user owns or belongs to, newest first.
    async fn classes_for_user(&self, user_id: &str) -> Result<Vec<ClassRecord>, StoreError>;

    /// Add `user_id` to the checked-in set, bump the count and stamp `at`, as one unit.
    async fn record_check_in(
        &self,
        class_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<CheckInRecord, StoreError>;
}

#[async_trait]
pub trait Users: Send + Sync {
    async fn user_exists(&self, user_id: &str) -> Result<bool, StoreError>;

    /// Returns `false` when a profile with the same id already exists.
    async fn create_profile(&self, profile: &UserProfile) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait Sessions: Send + Sync {
    async fn insert_session(
        &self,
        token_hash: &[u8],
        caller: &Caller,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Expired sessions resolve to `None`.
    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<Caller>, StoreError>;

    async fn delete_session(&self, token_hash: &[u8]) -> Result<(), StoreError>;
}

/// Every collection plus a liveness probe for `/health`.
#[async_trait]
pub trait Store: DeviceBindings + Classes + Users + Sessions {
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name reported by `/health`.
    fn backend(&self) -> &'static str;
}
