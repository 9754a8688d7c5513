//! Audit log middleware for signup, login and logout
//!
//! [`record`] wraps an audited handler: it persists a pending entry before
//! the handler runs and completes that same entry with the response once the
//! handler returns. Both writes must succeed; a failing audit store fails the
//! request. A body over [`MAX_AUDITED_BODY`] is still audited, with a
//! placeholder body, and answered with 413 without running the handler.

use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use chrono::Utc;
use serde_json::Value;
use std::net::SocketAddr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    jwt::Claims,
    middleware::decode_session,
    models::{AuditAction, Identity, NOT_AVAILABLE, NewLogEntry},
    repositories::UserStore,
    state::AppState,
};

/// Largest request body buffered for the audit trail
pub const MAX_AUDITED_BODY: usize = 1024 * 1024;

/// Recorded in place of a request body that could not be buffered
pub const OVERSIZED_BODY: &str = "[request body exceeds 1 MiB]";

/// Header carrying the audit correlation id back to the client
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// State handed to [`record`]: the app state plus the action being audited
#[derive(Clone)]
pub struct AuditScope {
    state: AppState,
    action: AuditAction,
}

impl AuditScope {
    pub fn new(state: AppState, action: AuditAction) -> Self {
        Self { state, action }
    }
}

/// What the audit layer knows about a request before the handler runs
#[derive(Debug, Default)]
pub struct RequestFacts {
    /// Request body parsed as JSON, when it is JSON
    pub body: Option<Value>,
    /// Claims of a valid session cookie, when there is one
    pub session: Option<Claims>,
}

impl RequestFacts {
    fn body_str(&self, path: &[&str]) -> Option<String> {
        let mut value = self.body.as_ref()?;
        for key in path {
            value = value.get(key)?;
        }
        value
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    }
}

/// Where the identity recorded for an entry comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// Taken verbatim from the request
    Submitted(Identity),
    /// Email from the request; the rest from the user holding that email
    ByEmail(Option<String>),
    /// Everything from the user the session belongs to
    BySubject(Option<i64>),
}

type IdentityResolver = fn(&RequestFacts) -> IdentitySource;

/// Dispatch table from audited action to identity resolution
pub fn identity_resolver(action: AuditAction) -> IdentityResolver {
    match action {
        AuditAction::Signup => identity_from_signup,
        AuditAction::Login => identity_from_login,
        AuditAction::Logout => identity_from_logout,
    }
}

fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn identity_from_signup(facts: &RequestFacts) -> IdentitySource {
    IdentitySource::Submitted(Identity {
        username: or_na(facts.body_str(&["user", "username"])),
        email: or_na(facts.body_str(&["user", "email"])),
        mobile: or_na(facts.body_str(&["user", "mobile"])),
    })
}

fn identity_from_login(facts: &RequestFacts) -> IdentitySource {
    IdentitySource::ByEmail(facts.body_str(&["email"]))
}

fn identity_from_logout(facts: &RequestFacts) -> IdentitySource {
    IdentitySource::BySubject(facts.session.as_ref().map(|claims| claims.user_id))
}

/// Resolve an identity source against the credential store.
///
/// Lookups are best effort: a missing user or a failing store yields "N/A".
pub async fn resolve_identity(source: IdentitySource, users: &dyn UserStore) -> Identity {
    match source {
        IdentitySource::Submitted(identity) => identity,
        IdentitySource::ByEmail(None) | IdentitySource::BySubject(None) => Identity::default(),
        IdentitySource::ByEmail(Some(email)) => {
            let user = users.find_by_email(&email).await.unwrap_or_else(|e| {
                warn!("Audit identity lookup by email failed: {}", e);
                None
            });
            Identity {
                username: or_na(user.as_ref().map(|u| u.username.clone())),
                email,
                mobile: or_na(user.map(|u| u.mobile)),
            }
        }
        IdentitySource::BySubject(Some(id)) => {
            match users.find_by_id(id).await {
                Ok(Some(user)) => Identity {
                    username: user.username,
                    email: user.email,
                    mobile: user.mobile,
                },
                Ok(None) => Identity::default(),
                Err(e) => {
                    warn!("Audit identity lookup by id failed: {}", e);
                    Identity::default()
                }
            }
        }
    }
}

/// Client address: first `X-Forwarded-For` hop, else the socket peer
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn raw_body(bytes: &Bytes) -> String {
    let body = String::from_utf8_lossy(bytes);
    if body.trim().is_empty() {
        "{}".to_string()
    } else {
        body.into_owned()
    }
}

/// Audit middleware; attach with `from_fn_with_state(AuditScope, record)`
pub async fn record(
    State(scope): State<AuditScope>,
    req: Request,
    next: Next,
) -> AuthResult<Response> {
    let AuditScope { state, action } = scope;
    let request_time = Utc::now();
    let request_id = Uuid::new_v4();

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip_address = client_ip(req.headers(), peer);

    let (parts, body) = req.into_parts();
    let buffered = to_bytes(body, MAX_AUDITED_BODY).await.ok();

    let jar = SignedCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
    let facts = RequestFacts {
        body: buffered
            .as_ref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok()),
        session: decode_session(&state, &jar).ok().flatten(),
    };
    let source = identity_resolver(action)(&facts);
    let identity = resolve_identity(source, state.users.as_ref()).await;

    let entry = state
        .audit_log
        .open(NewLogEntry {
            request_id,
            action_type: action,
            ip_address,
            request_body: buffered
                .as_ref()
                .map(raw_body)
                .unwrap_or_else(|| OVERSIZED_BODY.to_string()),
            request_time,
            identity,
        })
        .await
        .map_err(AuthError::AuditLog)?;

    info!("Audit {} opened for {} request", request_id, action);

    let response = match buffered {
        Some(bytes) => next.run(Request::from_parts(parts, Body::from(bytes))).await,
        None => {
            warn!("Rejected oversized {} request {}", action, request_id);
            AuthError::PayloadTooLarge.into_response()
        }
    };

    let (mut parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| AuthError::Internal)?;

    state
        .audit_log
        .complete(
            entry.id,
            String::from_utf8_lossy(&bytes).into_owned(),
            Utc::now(),
        )
        .await
        .map_err(AuthError::AuditLog)?;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        parts.headers.insert(REQUEST_ID_HEADER, value);
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}
