//! Storage seams for the credential store and the audit log
//!
//! Handlers only see the traits below. PostgreSQL implementations back the
//! deployed service; the in-memory ones back tests and database-less runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::StoreError,
    models::{LogEntry, NewLogEntry, NewUser, Role, UpdateUser, User},
};

pub mod log;
pub mod memory;
pub mod user;

pub use log::PgAuditLogStore;
pub use memory::{MemoryAuditLogStore, MemoryUserStore};
pub use user::{PgUserStore, hash_password, verify_password};

/// Durable user identity, role and password-hash storage.
///
/// Implementations enforce username/email/mobile uniqueness atomically and
/// report collisions as [`StoreError::Duplicate`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id_and_role(&self, id: i64, role: Role) -> Result<Option<User>, StoreError>;

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, StoreError>;

    /// Apply a partial update; [`StoreError::NotFound`] when the row is gone
    async fn update(&self, id: i64, changes: UpdateUser) -> Result<User, StoreError>;

    /// Returns whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

/// Append-then-complete storage for audit entries
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    /// Persist a pending entry before the audited operation runs
    async fn open(&self, entry: NewLogEntry) -> Result<LogEntry, StoreError>;

    /// Fill in the response of a pending entry.
    ///
    /// Fails with [`StoreError::AlreadyCompleted`] if the entry was completed
    /// before, and [`StoreError::NotFound`] if it does not exist.
    async fn complete(
        &self,
        id: i64,
        response_body: String,
        response_time: DateTime<Utc>,
    ) -> Result<LogEntry, StoreError>;
}
