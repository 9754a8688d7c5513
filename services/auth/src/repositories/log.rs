//! Audit log repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseError;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::AuditLogStore;
use crate::{
    error::StoreError,
    models::{AuditAction, LogEntry, NewLogEntry},
};

const LOG_COLUMNS: &str = "id, request_id, action_type, ip_address, request_body, request_time, \
     response_body, response_time, username, email, mobile";

fn entry_from_row(row: &PgRow) -> Result<LogEntry, StoreError> {
    let action: String = row.get("action_type");
    let action_type = match action.as_str() {
        "signup" => AuditAction::Signup,
        "login" => AuditAction::Login,
        "logout" => AuditAction::Logout,
        other => return Err(StoreError::Corrupt(format!("unknown action type: {}", other))),
    };

    Ok(LogEntry {
        id: row.get("id"),
        request_id: row.get("request_id"),
        action_type,
        ip_address: row.get("ip_address"),
        request_body: row.get("request_body"),
        request_time: row.get("request_time"),
        response_body: row.get("response_body"),
        response_time: row.get("response_time"),
        username: row.get("username"),
        email: row.get("email"),
        mobile: row.get("mobile"),
    })
}

fn query_error(err: sqlx::Error) -> StoreError {
    StoreError::Database(DatabaseError::from_query(err))
}

/// PostgreSQL-backed audit log
#[derive(Clone)]
pub struct PgAuditLogStore {
    pool: PgPool,
}

impl PgAuditLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogStore for PgAuditLogStore {
    async fn open(&self, entry: NewLogEntry) -> Result<LogEntry, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO logs (request_id, action_type, ip_address, request_body, request_time,
                              username, email, mobile)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(entry.request_id)
        .bind(entry.action_type.as_str())
        .bind(&entry.ip_address)
        .bind(&entry.request_body)
        .bind(entry.request_time)
        .bind(&entry.identity.username)
        .bind(&entry.identity.email)
        .bind(&entry.identity.mobile)
        .fetch_one(&self.pool)
        .await
        .map_err(query_error)?;

        entry_from_row(&row)
    }

    async fn complete(
        &self,
        id: i64,
        response_body: String,
        response_time: DateTime<Utc>,
    ) -> Result<LogEntry, StoreError> {
        // The IS NULL guard keeps completed rows immutable.
        let row = sqlx::query(&format!(
            r#"
            UPDATE logs
            SET response_body = $2, response_time = $3, updated_at = NOW()
            WHERE id = $1 AND response_time IS NULL
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&response_body)
        .bind(response_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        if let Some(row) = row {
            return entry_from_row(&row);
        }

        let exists = sqlx::query("SELECT 1 FROM logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?
            .is_some();

        if exists {
            Err(StoreError::AlreadyCompleted(id))
        } else {
            Err(StoreError::NotFound)
        }
    }
}
