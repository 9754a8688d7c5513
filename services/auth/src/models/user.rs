//! User model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// User entity as held by the credential store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub mobile: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user creation payload, already validated and hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub mobile: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub password_hash: Option<String>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.mobile.is_none()
            && self.password_hash.is_none()
    }
}

/// User attributes as submitted by a client; every field may be missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserParams {
    pub username: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

impl UserParams {
    /// Drop blank fields, as partial updates ignore them
    pub fn without_blanks(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        Self {
            username: keep(self.username),
            email: keep(self.email),
            mobile: keep(self.mobile),
            password: keep(self.password),
            password_confirmation: keep(self.password_confirmation),
        }
    }
}

/// User login credentials
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginCredentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public projection used by the librarian listing
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub mobile: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            mobile: user.mobile.clone(),
            role: user.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_never_serialized() {
        let now = Utc::now();
        let user = User {
            id: 7,
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            mobile: "1234567890".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Member,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "Member");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn blank_params_are_dropped() {
        let params: UserParams = serde_json::from_value(serde_json::json!({
            "username": "UpdatedName",
            "email": "",
            "mobile": "   ",
        }))
        .unwrap();

        let params = params.without_blanks();
        assert_eq!(params.username.as_deref(), Some("UpdatedName"));
        assert_eq!(params.email, None);
        assert_eq!(params.mobile, None);
        assert_eq!(params.password, None);
    }
}
