//! Public authentication endpoints: registration and token acquisition.

use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{generate_jwt, hash_password, verify_password, Claims};
use crate::database::manager::DatabaseManager;
use crate::database::models::user::{self, User};
use crate::domain::role::UserRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub npwp: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// POST /auth/register - Create a taxpayer account
pub async fn register(Json(payload): Json<RegisterRequest>) -> ApiResult<User> {
    let mut missing = vec![];
    if payload.name.as_deref().map_or(true, |s| s.trim().is_empty()) {
        missing.push("name");
    }
    if payload.email.as_deref().map_or(true, |s| s.trim().is_empty()) {
        missing.push("email");
    }
    if payload.password.as_deref().map_or(true, |s| s.is_empty()) {
        missing.push("password");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let name = payload.name.unwrap();
    let email = payload.email.unwrap().trim().to_lowercase();
    let password = payload.password.unwrap();

    if !email.contains('@') {
        return Err(ApiError::validation("Invalid email address", None));
    }

    let pool = DatabaseManager::pool().await?;

    if user::find_by_email(&pool, &email).await?.is_some() {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let now = Utc::now();
    let record = User {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        email: email.clone(),
        npwp: payload.npwp.filter(|s| !s.trim().is_empty()),
        // Self-registration always lands as a taxpayer; staff roles are
        // granted through user administration
        role: UserRole::WajibPajak.as_str().to_string(),
        phone: payload.phone,
        address: payload.address,
        password_hash: hash_password(&email, &password),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    user::insert(&pool, &record).await?;
    tracing::info!("registered taxpayer account {}", record.id);

    Ok(ApiResponse::created(record))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// POST /auth/login - Authenticate and receive a JWT
pub async fn login(Json(payload): Json<LoginRequest>) -> ApiResult<Value> {
    let mut missing = vec![];
    if payload.email.as_deref().map_or(true, |s| s.trim().is_empty()) {
        missing.push("email");
    }
    if payload.password.as_deref().map_or(true, |s| s.is_empty()) {
        missing.push("password");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let email = payload.email.unwrap().trim().to_lowercase();
    let password = payload.password.unwrap();

    let pool = DatabaseManager::pool().await?;
    let account = user::find_by_email(&pool, &email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !verify_password(&email, &password, &account.password_hash) {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if !account.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    let role: UserRole = account
        .role
        .parse()
        .map_err(|_| ApiError::internal("Account has an unrecognized role"))?;

    let claims = Claims::new(account.id, account.name.clone(), role);
    let expires_in = claims.expires_in_secs();
    let token = generate_jwt(&claims).map_err(|e| {
        tracing::error!("JWT generation failed: {}", e);
        ApiError::internal("Failed to issue token")
    })?;

    Ok(ApiResponse::success(json!({
        "token": token,
        "user": account,
        "expires_in": expires_in,
    })))
}
