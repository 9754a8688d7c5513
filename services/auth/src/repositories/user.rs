//! User repository for database operations

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{info, warn};

use super::UserStore;
use crate::{
    error::StoreError,
    models::{NewUser, Role, UpdateUser, User},
};

const USER_COLUMNS: &str =
    "id, username, email, mobile, password_digest, role, created_at, updated_at";

/// Hash a plaintext password with Argon2 and a fresh salt
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Hashing(e.to_string()))
}

/// Check a plaintext password against a stored hash.
///
/// An unparsable hash never verifies.
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Map a unique-constraint name onto the user-facing field label
fn duplicate_field(constraint: &str) -> &'static str {
    if constraint.contains("username") {
        "Username"
    } else if constraint.contains("email") {
        "Email"
    } else if constraint.contains("mobile") {
        "Mobile"
    } else {
        "Record"
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    let err = DatabaseError::from_query(err);
    match err.violated_constraint() {
        Some(constraint) => StoreError::Duplicate {
            fields: vec![duplicate_field(constraint)],
        },
        None => StoreError::Database(err),
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.get("role");
    let role = role
        .parse::<Role>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        mobile: row.get("mobile"),
        password_hash: row.get("password_digest"),
        role,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Labels of the taken unique columns, in column order
fn taken_fields(username: bool, email: bool, mobile: bool) -> Vec<&'static str> {
    [(username, "Username"), (email, "Email"), (mobile, "Mobile")]
        .into_iter()
        .filter_map(|(taken, field)| taken.then_some(field))
        .collect()
}

/// PostgreSQL-backed credential store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Unique columns already held by a row other than `except`
    async fn collisions(
        &self,
        except: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
        mobile: Option<&str>,
    ) -> Result<Vec<&'static str>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(bool_or(username = $2), FALSE) AS username_taken,
                   COALESCE(bool_or(email = $3), FALSE) AS email_taken,
                   COALESCE(bool_or(mobile = $4), FALSE) AS mobile_taken
            FROM users
            WHERE $1::BIGINT IS NULL OR id <> $1
            "#,
        )
        .bind(except)
        .bind(username)
        .bind(email)
        .bind(mobile)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Ok(taken_fields(
            row.get("username_taken"),
            row.get("email_taken"),
            row.get("mobile_taken"),
        ))
    }

    /// Postgres names only the first violated constraint; report every
    /// colliding column instead. The constraint stays authoritative: if the
    /// follow-up lookup finds nothing, the original report is kept.
    async fn widen_duplicate(
        &self,
        err: StoreError,
        except: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
        mobile: Option<&str>,
    ) -> StoreError {
        if !matches!(err, StoreError::Duplicate { .. }) {
            return err;
        }

        match self.collisions(except, username, email, mobile).await {
            Ok(fields) if !fields.is_empty() => StoreError::Duplicate { fields },
            Ok(_) => err,
            Err(lookup) => {
                warn!("Duplicate field lookup failed: {}", lookup);
                err
            }
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        info!("Creating new {} user: {}", new_user.role, new_user.username);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (username, email, mobile, password_digest, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.mobile)
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(classify);

        match row {
            Ok(row) => user_from_row(&row),
            Err(err) => Err(self
                .widen_duplicate(
                    err,
                    None,
                    Some(new_user.username.as_str()),
                    Some(new_user.email.as_str()),
                    Some(new_user.mobile.as_str()),
                )
                .await),
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id_and_role(&self, id: i64, role: Role) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND role = $2"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY id"
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.iter().map(user_from_row).collect()
    }

    async fn update(&self, id: i64, changes: UpdateUser) -> Result<User, StoreError> {
        info!("Updating user: {}", id);

        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                mobile = COALESCE($4, mobile),
                password_digest = COALESCE($5, password_digest),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.mobile)
        .bind(&changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify);

        match row {
            Ok(Some(row)) => user_from_row(&row),
            Ok(None) => Err(StoreError::NotFound),
            Err(err) => Err(self
                .widen_duplicate(
                    err,
                    Some(id),
                    changes.username.as_deref(),
                    changes.email.as_deref(),
                    changes.mobile.as_deref(),
                )
                .await),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        info!("Deleting user: {}", id);

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected() > 0)
    }
}
