//! Profile and user-administration endpoints.
//!
//! `/api/profile` is the caller's own account; `/api/users` is the staff
//! view, with role/activation changes reserved for admins.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::user::{self, User};
use crate::database::query::{
    self, clamp_limit, clamp_page, Pagination, Param, SelectBuilder, UpdateBuilder,
};
use crate::domain::role::UserRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

use super::to_json;

/// GET /api/profile - The caller's own account, fresh from the database
pub async fn get_profile(Extension(auth_user): Extension<AuthUser>) -> ApiResult<User> {
    let pool = DatabaseManager::pool().await?;
    let account: User = query::find_by_id(&pool, user::TABLE, auth_user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account not found"))?;
    Ok(ApiResponse::success(account))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub npwp: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// PATCH /api/profile - Sparse update of the caller's own account
pub async fn update_profile(
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateProfile>,
) -> ApiResult<User> {
    if let Some(name) = payload.name.as_deref() {
        if name.trim().is_empty() {
            return Err(ApiError::validation("'name' must not be empty", None));
        }
    }

    let pool = DatabaseManager::pool().await?;
    let existing: User = query::find_by_id(&pool, user::TABLE, auth_user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account not found"))?;

    let builder = UpdateBuilder::new()
        .set_opt("name", payload.name.map(|n| Param::Str(n.trim().to_string())))
        .set_opt("npwp", payload.npwp.map(Param::Str))
        .set_opt("phone", payload.phone.map(Param::Str))
        .set_opt("address", payload.address.map(Param::Str));

    if builder.is_empty() {
        return Ok(ApiResponse::success(existing));
    }

    let updated: User = builder
        .execute_returning(&pool, user::TABLE, auth_user.id)
        .await?;

    Ok(ApiResponse::success(updated))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

/// GET /api/users - Staff-only directory
pub async fn list_users(
    Query(params): Query<ListUsersQuery>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    if !auth_user.role.is_privileged() {
        return Err(ApiError::forbidden("Only tax officers may list users"));
    }

    let role_filter = params
        .role
        .as_deref()
        .map(|r| r.parse::<UserRole>())
        .transpose()
        .map_err(|e| ApiError::validation(e, None))?;
    let page = clamp_page(params.page);
    let limit = clamp_limit(params.limit);

    let builder = SelectBuilder::new(user::TABLE)
        .eq_opt(
            "role",
            role_filter.map(|r| Param::Str(r.as_str().to_string())),
        )
        .eq_opt("is_active", params.is_active.map(Param::Bool))
        .search(user::SEARCH_COLUMNS, params.search.as_deref())
        .paginate(page, limit);

    let pool = DatabaseManager::pool().await?;
    let items: Vec<User> = builder.fetch(&pool).await?;
    let total = builder.count(&pool).await?;
    let pagination = Pagination::new(page, limit, total);

    Ok(ApiResponse::paginated(to_json(&items)?, pagination))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

/// PATCH /api/users/:id - Admin-only role and activation changes
pub async fn update_user(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateUser>,
) -> ApiResult<User> {
    if auth_user.role != UserRole::Admin {
        return Err(ApiError::forbidden("Only admins may manage user accounts"));
    }
    if id == auth_user.id && payload.is_active == Some(false) {
        return Err(ApiError::conflict("You cannot deactivate your own account"));
    }

    let role = payload
        .role
        .as_deref()
        .map(|r| r.parse::<UserRole>())
        .transpose()
        .map_err(|e| ApiError::validation(e, None))?;

    let pool = DatabaseManager::pool().await?;
    let existing: User = query::find_by_id(&pool, user::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let builder = UpdateBuilder::new()
        .set_opt("role", role.map(|r| Param::Str(r.as_str().to_string())))
        .set_opt("is_active", payload.is_active.map(Param::Bool));

    if builder.is_empty() {
        return Ok(ApiResponse::success(existing));
    }

    let updated: User = builder.execute_returning(&pool, user::TABLE, id).await?;
    tracing::info!(
        "admin {} updated user {} (role: {:?}, active: {:?})",
        auth_user.id,
        id,
        updated.role,
        updated.is_active
    );

    Ok(ApiResponse::success(updated))
}

/// GET /api/users/:id - Staff-only single account view
pub async fn get_user(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    if !auth_user.role.is_privileged() {
        return Err(ApiError::forbidden("Only tax officers may view users"));
    }

    let pool = DatabaseManager::pool().await?;
    let account: User = query::find_by_id(&pool, user::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::success(json!(account)))
}
