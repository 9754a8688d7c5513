//! In-memory stores
//!
//! Used by the test suites and by `storage.backend = "memory"`. Uniqueness
//! checks and inserts happen under one lock, so they are atomic just like the
//! database constraints they stand in for.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;

use super::{AuditLogStore, UserStore};
use crate::{
    error::StoreError,
    models::{LogEntry, NewLogEntry, NewUser, Role, UpdateUser, User},
};

#[derive(Default)]
struct UserTable {
    last_id: i64,
    rows: BTreeMap<i64, User>,
}

impl UserTable {
    fn taken(&self, except: Option<i64>, matches: impl Fn(&User) -> bool) -> bool {
        self.rows
            .values()
            .any(|u| Some(u.id) != except && matches(u))
    }

    /// Unique columns already held by a row other than `except`
    fn collisions(
        &self,
        except: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
        mobile: Option<&str>,
    ) -> Vec<&'static str> {
        let mut fields = Vec::new();

        if let Some(username) = username {
            if self.taken(except, |u| u.username == username) {
                fields.push("Username");
            }
        }
        if let Some(email) = email {
            if self.taken(except, |u| u.email == email) {
                fields.push("Email");
            }
        }
        if let Some(mobile) = mobile {
            if self.taken(except, |u| u.mobile == mobile) {
                fields.push("Mobile");
            }
        }

        fields
    }
}

/// Credential store held in process memory
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    table: Arc<Mutex<UserTable>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut table = self.table.lock().await;

        let fields = table.collisions(
            None,
            Some(&new_user.username),
            Some(&new_user.email),
            Some(&new_user.mobile),
        );
        if !fields.is_empty() {
            return Err(StoreError::Duplicate { fields });
        }

        table.last_id += 1;
        let now = Utc::now();
        let user = User {
            id: table.last_id,
            username: new_user.username,
            email: new_user.email,
            mobile: new_user.mobile,
            password_hash: new_user.password_hash,
            role: new_user.role,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.table.lock().await.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.lock().await;
        Ok(table.rows.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id_and_role(&self, id: i64, role: Role) -> Result<Option<User>, StoreError> {
        let table = self.table.lock().await;
        Ok(table.rows.get(&id).filter(|u| u.role == role).cloned())
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }

    async fn update(&self, id: i64, changes: UpdateUser) -> Result<User, StoreError> {
        let mut table = self.table.lock().await;

        if !table.rows.contains_key(&id) {
            return Err(StoreError::NotFound);
        }

        let fields = table.collisions(
            Some(id),
            changes.username.as_deref(),
            changes.email.as_deref(),
            changes.mobile.as_deref(),
        );
        if !fields.is_empty() {
            return Err(StoreError::Duplicate { fields });
        }

        let user = table.rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(mobile) = changes.mobile {
            user.mobile = mobile;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.table.lock().await.rows.remove(&id).is_some())
    }
}

#[derive(Default)]
struct LogTable {
    last_id: i64,
    rows: Vec<LogEntry>,
}

/// Audit log held in process memory
#[derive(Clone, Default)]
pub struct MemoryAuditLogStore {
    table: Arc<Mutex<LogTable>>,
}

impl MemoryAuditLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry in insertion order
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.table.lock().await.rows.clone()
    }
}

#[async_trait]
impl AuditLogStore for MemoryAuditLogStore {
    async fn open(&self, entry: NewLogEntry) -> Result<LogEntry, StoreError> {
        let mut table = self.table.lock().await;
        table.last_id += 1;

        let row = LogEntry {
            id: table.last_id,
            request_id: entry.request_id,
            action_type: entry.action_type,
            ip_address: entry.ip_address,
            request_body: entry.request_body,
            request_time: entry.request_time,
            response_body: None,
            response_time: None,
            username: entry.identity.username,
            email: entry.identity.email,
            mobile: entry.identity.mobile,
        };
        table.rows.push(row.clone());

        Ok(row)
    }

    async fn complete(
        &self,
        id: i64,
        response_body: String,
        response_time: DateTime<Utc>,
    ) -> Result<LogEntry, StoreError> {
        let mut table = self.table.lock().await;
        let row = table
            .rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::NotFound)?;

        if row.is_completed() {
            return Err(StoreError::AlreadyCompleted(id));
        }

        row.response_body = Some(response_body);
        row.response_time = Some(response_time);
        Ok(row.clone())
    }
}
