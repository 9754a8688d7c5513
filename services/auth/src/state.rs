//! Application state shared across handlers

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

use crate::{
    jwt::TokenService,
    repositories::{AuditLogStore, UserStore},
    session::{SessionCarrier, cookie_key},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub audit_log: Arc<dyn AuditLogStore>,
    pub tokens: TokenService,
    pub sessions: SessionCarrier,
    pub cookie_key: Key,
}

impl AppState {
    /// Wire the stores with token and cookie keys derived from `secret`.
    ///
    /// `secret` must be at least 32 bytes long.
    pub fn new(
        users: Arc<dyn UserStore>,
        audit_log: Arc<dyn AuditLogStore>,
        secret: &[u8],
        sessions: SessionCarrier,
    ) -> Self {
        Self {
            users,
            audit_log,
            tokens: TokenService::new(secret),
            sessions,
            cookie_key: cookie_key(secret),
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
