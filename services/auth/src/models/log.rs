//! Audit log entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Placeholder recorded when an identity field cannot be resolved
pub const NOT_AVAILABLE: &str = "N/A";

/// Sensitive actions whose requests are audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Signup,
    Login,
    Logout,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Signup => "signup",
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort identity observed at request time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub email: String,
    pub mobile: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            username: NOT_AVAILABLE.to_string(),
            email: NOT_AVAILABLE.to_string(),
            mobile: NOT_AVAILABLE.to_string(),
        }
    }
}

/// One audited request/response pair.
///
/// `response_body` and `response_time` stay `None` until the entry is
/// completed; after that the row is never touched again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub request_id: Uuid,
    pub action_type: AuditAction,
    pub ip_address: String,
    pub request_body: String,
    pub request_time: DateTime<Utc>,
    pub response_body: Option<String>,
    pub response_time: Option<DateTime<Utc>>,
    pub username: String,
    pub email: String,
    pub mobile: String,
}

impl LogEntry {
    pub fn is_completed(&self) -> bool {
        self.response_time.is_some()
    }
}

/// Pending entry written before the audited operation runs
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub request_id: Uuid,
    pub action_type: AuditAction,
    pub ip_address: String,
    pub request_body: String,
    pub request_time: DateTime<Utc>,
    pub identity: Identity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_defaults_to_not_available() {
        let identity = Identity::default();
        assert_eq!(identity.username, "N/A");
        assert_eq!(identity.email, "N/A");
        assert_eq!(identity.mobile, "N/A");
    }

    #[test]
    fn action_names_match_wire_format() {
        assert_eq!(AuditAction::Signup.to_string(), "signup");
        assert_eq!(
            serde_json::to_string(&AuditAction::Logout).unwrap(),
            "\"logout\""
        );
    }
}
