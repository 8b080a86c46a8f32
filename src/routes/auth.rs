/**
 * Authentication Routes
 * JWT login for the back office, plus the middleware guarding the
 * authenticated and admin tiers
 */
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::db::models::User;
use crate::db::users;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::routes::MessageResponse;
use crate::AppState;

pub const ADMIN_ROLE: &str = "admin";

const MIN_PASSWORD_LEN: usize = 8;

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,   // User ID
    pub email: String, // User email
    pub role: String,  // User role
    pub exp: i64,      // Expiry timestamp
    pub iat: i64,      // Issued at timestamp
}

/// Caller identity inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = ApiError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;
        Ok(Self {
            id,
            email: claims.email,
            role: claims.role,
        })
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

/// User info returned to the frontend
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Create access token
pub fn create_access_token(
    auth: &AuthConfig,
    user: &User,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(auth.token_expiry_hours);

    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.clone(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
}

/// Verify and decode access token
pub fn verify_access_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// bcrypt is CPU-bound; keep it off the async workers.
async fn password_matches(password: String, password_hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify(&password, &password_hash))
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking panic during verify: {}", e);
            ApiError::internal("Failed to process password")
        })?
        .map_err(|e| {
            tracing::error!("Failed to verify password: {}", e);
            ApiError::internal("Failed to process password")
        })
}

async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash(&password, DEFAULT_COST))
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking panic during hash: {}", e);
            ApiError::internal("Failed to process password")
        })?
        .map_err(|e| {
            tracing::error!("Failed to hash password: {}", e);
            ApiError::internal("Failed to process password")
        })
}

// ============================================================================
// Middleware
// ============================================================================

fn authenticate(state: &AppState, req: &Request) -> ApiResult<AuthUser> {
    let token = extract_bearer_token(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization token".to_string()))?;

    let claims = verify_access_token(&state.config.auth.jwt_secret, token).map_err(|e| {
        tracing::debug!(error = %e, uri = %req.uri(), "rejected access token");
        ApiError::Unauthorized("Invalid or expired token".to_string())
    })?;

    AuthUser::try_from(claims)
}

/// Rejects requests without a valid bearer token and attaches [`AuthUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, &req)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Same as [`require_auth`] and additionally requires the admin role.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, &req)?;
    if !user.is_admin() {
        tracing::warn!(user_id = user.id, uri = %req.uri(), "non-admin access denied");
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
/// Authenticate an admin account and return a bearer token
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::invalid("Email and password are required"));
    }
    if !email.contains('@') {
        return Err(ApiError::invalid("Invalid email format"));
    }

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let user = users::find_by_email(state.store.pool(), email)
        .await?
        .ok_or_else(invalid)?;

    if !password_matches(payload.password, user.password_hash.clone()).await? {
        tracing::warn!(email = %user.email, "failed login attempt");
        return Err(invalid());
    }

    let token = create_access_token(&state.config.auth, &user).map_err(|e| {
        tracing::error!("Failed to create token: {}", e);
        ApiError::internal("Failed to create token")
    })?;

    tracing::info!(user_id = user.id, "admin logged in");
    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            token,
            user: UserInfo::from(&user),
        }),
    ))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<UserInfo>> {
    let user = users::get(state.store.pool(), auth.id).await?;
    Ok(Json(UserInfo::from(&user)))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if payload.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }

    let user = users::get(state.store.pool(), auth.id).await?;
    if !password_matches(payload.current_password, user.password_hash.clone()).await? {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_password(payload.new_password).await?;
    users::update_password(state.store.pool(), user.id, &new_hash).await?;

    tracing::info!(user_id = user.id, "password changed");
    Ok(Json(MessageResponse::new("Password updated")))
}
