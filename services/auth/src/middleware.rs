//! Authorization gate: session decoding and role enforcement

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::SignedCookieJar;
use tracing::warn;

use crate::{
    error::{AuthError, AuthResult},
    jwt::{Claims, TokenError},
    models::{Role, User},
    state::AppState,
};

/// The user a gate let through, available to handlers as an extension
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Decode the session carried by the request.
///
/// `Ok(None)` means the request carries no (correctly signed) session cookie.
pub fn decode_session(
    state: &AppState,
    jar: &SignedCookieJar,
) -> Result<Option<Claims>, TokenError> {
    state
        .sessions
        .read_session(jar)
        .map(|token| state.tokens.verify(&token))
        .transpose()
}

/// Exact role equality; roles have no hierarchy
fn role_satisfies(actual: Role, required: Role) -> bool {
    match (required, actual) {
        (Role::Admin, Role::Admin)
        | (Role::Librarian, Role::Librarian)
        | (Role::Member, Role::Member) => true,
        (Role::Admin | Role::Librarian | Role::Member, _) => false,
    }
}

/// Admit the request's subject only if it currently holds `required`.
///
/// The role is re-read from the credential store, so a token issued before a
/// role change or deletion no longer opens the gate.
pub async fn authorize(
    state: &AppState,
    jar: &SignedCookieJar,
    required: Role,
) -> AuthResult<User> {
    let claims = match decode_session(state, jar) {
        Ok(Some(claims)) => claims,
        Ok(None) => return Err(AuthError::Forbidden(required)),
        Err(e) => {
            warn!("Rejected session token: {}", e);
            return Err(AuthError::InvalidToken);
        }
    };

    let user = state
        .users
        .find_by_id(claims.user_id)
        .await?
        .ok_or(AuthError::Forbidden(required))?;

    if !role_satisfies(user.role, required) {
        warn!(
            "User {} with role {} denied {} access",
            user.id, user.role, required
        );
        return Err(AuthError::Forbidden(required));
    }

    Ok(user)
}

/// State handed to [`require_role`]
#[derive(Clone)]
pub struct RoleGate {
    state: AppState,
    role: Role,
}

impl RoleGate {
    pub fn new(state: AppState, role: Role) -> Self {
        Self { state, role }
    }
}

/// Gate middleware; attach with `from_fn_with_state(RoleGate, require_role)`.
///
/// Rejected requests never reach the handler.
pub async fn require_role(
    State(gate): State<RoleGate>,
    mut req: Request,
    next: Next,
) -> AuthResult<Response> {
    let jar = SignedCookieJar::from_headers(req.headers(), gate.state.cookie_key.clone());
    let user = authorize(&gate.state, &jar, gate.role).await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
