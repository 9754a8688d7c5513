//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode, header, header::InvalidHeaderValue},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::{
    audit::{self, AuditScope},
    error::{AuthError, AuthResult, StoreError},
    middleware::{CurrentUser, RoleGate, decode_session, require_role},
    models::{
        AuditAction, LoginCredentials, NewUser, Role, UpdateUser, User, UserParams, UserSummary,
    },
    repositories::{hash_password, verify_password},
    state::AppState,
    validation::{validate_new_user, validate_update},
};

/// Body of signup and librarian creation requests
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub user: UserParams,
}

/// Body of librarian updates: fields nested under `user` or at the top level
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateLibrarianRequest {
    pub user: Option<UserParams>,
    #[serde(flatten)]
    pub fields: UserParams,
}

impl UpdateLibrarianRequest {
    fn into_params(self) -> UserParams {
        self.user.unwrap_or(self.fields).without_blanks()
    }
}

/// Create the router for the authentication service
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    let admin = Router::new()
        .route("/users/create_librarian", post(create_librarian))
        .route("/users/:id/destroy_librarian", delete(destroy_librarian))
        .route("/users/:id/update_librarian", put(update_librarian))
        .route("/users/view_librarian", get(view_librarian))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::new(state.clone(), Role::Admin),
            require_role,
        ));

    let signup_route = post(signup).route_layer(middleware::from_fn_with_state(
        AuditScope::new(state.clone(), AuditAction::Signup),
        audit::record,
    ));
    let login_route = post(login).route_layer(middleware::from_fn_with_state(
        AuditScope::new(state.clone(), AuditAction::Login),
        audit::record,
    ));
    let logout_route = delete(logout).route_layer(middleware::from_fn_with_state(
        AuditScope::new(state.clone(), AuditAction::Logout),
        audit::record,
    ));

    Router::new()
        .route("/health", get(health_check))
        .route("/signup", signup_route)
        .route("/login", login_route)
        .route("/logout", logout_route)
        .route("/users/validate_token", get(validate_token))
        .merge(admin)
        .layer(cors)
        .with_state(state)
}

/// CORS policy for the single trusted frontend origin
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    let origin = HeaderValue::from_str(allowed_origin)?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
            Method::HEAD,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .expose_headers([header::AUTHORIZATION, header::SET_COOKIE])
        .max_age(Duration::from_secs(3600)))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "library-auth"
    }))
}

/// Validate, hash and persist a new account with the given role
async fn register(state: &AppState, params: UserParams, role: Role) -> AuthResult<User> {
    validate_new_user(&params).map_err(AuthError::Validation)?;

    let password_hash = hash_password(params.password.as_deref().unwrap_or_default())?;
    let user = state
        .users
        .create(NewUser {
            username: params.username.unwrap_or_default(),
            email: params.email.unwrap_or_default(),
            mobile: params.mobile.unwrap_or_default(),
            password_hash,
            role,
        })
        .await?;

    Ok(user)
}

/// Member signup; the new member is logged in right away
pub async fn signup(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    payload: Option<Json<SignupRequest>>,
) -> AuthResult<impl IntoResponse> {
    let Json(request) = payload.unwrap_or_default();
    let user = register(&state, request.user, Role::Member).await?;
    let token = state.tokens.issue(&user)?;

    info!("Member {} signed up", user.id);

    Ok((
        StatusCode::CREATED,
        state.sessions.set_session(jar, token),
        Json(json!({
            "message": "Account created and logged in successfully",
            "role": user.role,
            "username": user.username,
        })),
    ))
}

/// User login, for every role
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    payload: Option<Json<LoginCredentials>>,
) -> AuthResult<impl IntoResponse> {
    let Json(credentials) = payload.unwrap_or_default();
    let (Some(email), Some(password)) = (credentials.email, credentials.password) else {
        return Err(AuthError::InvalidCredentials);
    };

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .filter(|user| verify_password(&user.password_hash, &password))
        .ok_or_else(|| {
            warn!("Failed login attempt");
            AuthError::InvalidCredentials
        })?;

    let token = state.tokens.issue(&user)?;
    info!("User {} logged in", user.id);

    Ok((
        state.sessions.set_session(jar, token),
        Json(json!({
            "message": "Login successful",
            "role": user.role,
            "username": user.username,
        })),
    ))
}

/// Logout always succeeds and always expires the session cookie
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        state.sessions.clear_session(),
        Json(json!({ "message": "User logged out successfully." })),
    )
}

/// Token introspection for sibling services
pub async fn validate_token(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> AuthResult<impl IntoResponse> {
    let claims = match decode_session(&state, &jar) {
        Ok(Some(claims)) => claims,
        Ok(None) | Err(_) => return Err(AuthError::InvalidToken),
    };

    let user = state
        .users
        .find_by_id(claims.user_id)
        .await?
        .ok_or(AuthError::NotFound("User not found"))?;

    Ok(Json(json!({
        "user_id": user.id,
        "username": user.username,
        "role": user.role,
        "email": user.email,
        "mobile": user.mobile,
    })))
}

pub async fn create_librarian(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    payload: Option<Json<SignupRequest>>,
) -> AuthResult<impl IntoResponse> {
    let Json(request) = payload.unwrap_or_default();
    let librarian = register(&state, request.user, Role::Librarian).await?;

    info!("Admin {} created librarian {}", admin.id, librarian.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Librarian created successfully",
            "user": librarian,
        })),
    ))
}

pub async fn destroy_librarian(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AuthResult<impl IntoResponse> {
    state
        .users
        .find_by_id_and_role(id, Role::Librarian)
        .await?
        .ok_or(AuthError::NotFound("Librarian not found"))?;

    if !state.users.delete(id).await? {
        return Err(AuthError::NotFound("Librarian not found"));
    }

    info!("Admin {} deleted librarian {}", admin.id, id);
    Ok(Json(json!({ "message": "Librarian deleted successfully" })))
}

/// Partial update; blank fields are ignored
pub async fn update_librarian(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    payload: Option<Json<UpdateLibrarianRequest>>,
) -> AuthResult<impl IntoResponse> {
    let librarian = state
        .users
        .find_by_id_and_role(id, Role::Librarian)
        .await?
        .ok_or(AuthError::NotFound("Librarian not found"))?;

    let Json(request) = payload.unwrap_or_default();
    let params = request.into_params();
    validate_update(&params).map_err(AuthError::Validation)?;

    let changes = UpdateUser {
        password_hash: params.password.as_deref().map(hash_password).transpose()?,
        username: params.username,
        email: params.email,
        mobile: params.mobile,
    };

    let librarian = if changes.is_empty() {
        librarian
    } else {
        state.users.update(id, changes).await.map_err(|e| match e {
            StoreError::NotFound => AuthError::NotFound("Librarian not found"),
            other => other.into(),
        })?
    };

    info!("Admin {} updated librarian {}", admin.id, id);

    Ok(Json(json!({
        "message": "Librarian updated successfully",
        "user": librarian,
    })))
}

pub async fn view_librarian(State(state): State<AppState>) -> AuthResult<impl IntoResponse> {
    let librarians: Vec<UserSummary> = state
        .users
        .list_by_role(Role::Librarian)
        .await?
        .iter()
        .map(UserSummary::from)
        .collect();

    if librarians.is_empty() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No librarians found" })),
        ));
    }

    Ok((StatusCode::OK, Json(json!({ "librarians": librarians }))))
}
