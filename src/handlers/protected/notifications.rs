//! Notification endpoints.
//!
//! Notifications are strictly personal: mark_read / mark_unread only ever
//! touch the caller's own rows, and an out-of-scope id simply contributes
//! nothing to the affected count.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::{self, ResponseCache};
use crate::database::manager::DatabaseManager;
use crate::database::models::notification::{self, Notification, NotificationType};
use crate::database::query::{
    self, clamp_limit, clamp_page, Pagination, Param, SelectBuilder,
};
use crate::domain::bulk::{BulkAction, BulkOutcome, BulkRequest};
use crate::domain::role::Scope;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

use super::{ensure_bulk_scope, to_json};

#[derive(Debug, Deserialize, Serialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub notification_type: Option<String>,
    pub is_read: Option<bool>,
}

/// GET /api/notifications - The caller's own notifications
pub async fn list(
    Query(params): Query<ListQuery>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let cache_key = cache::list_key(notification::TABLE, auth_user.id, auth_user.role, &params);
    let response_cache = ResponseCache::instance();

    if let Some(hit) = response_cache.get(&cache_key).await {
        if let Ok(pagination) = serde_json::from_value::<Pagination>(hit["pagination"].clone()) {
            return Ok(ApiResponse::paginated(hit["data"].clone(), pagination));
        }
    }

    let page = clamp_page(params.page);
    let limit = clamp_limit(params.limit);

    // Even privileged roles only list their own inbox
    let builder = SelectBuilder::new(notification::TABLE)
        .eq("owner_id", Param::Uuid(auth_user.id))
        .eq_opt(
            "notification_type",
            params.notification_type.clone().map(Param::Str),
        )
        .eq_opt("is_read", params.is_read.map(Param::Bool))
        .search(notification::SEARCH_COLUMNS, params.search.as_deref())
        .paginate(page, limit);

    let pool = DatabaseManager::pool().await?;
    let items: Vec<Notification> = builder.fetch(&pool).await?;
    let total = builder.count(&pool).await?;
    let pagination = Pagination::new(page, limit, total);

    let data = to_json(&items)?;
    response_cache
        .put(cache_key, json!({ "data": data, "pagination": pagination }))
        .await;

    Ok(ApiResponse::paginated(data, pagination))
}

#[derive(Debug, Deserialize)]
pub struct CreateNotification {
    pub owner_id: Option<Uuid>,
    pub title: Option<String>,
    pub message: Option<String>,
}

/// POST /api/notifications - Staff announcement to one user
pub async fn create(
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateNotification>,
) -> ApiResult<Value> {
    if !auth_user.role.is_privileged() {
        return Err(ApiError::forbidden(
            "Only tax officers may send notifications",
        ));
    }

    let mut missing = vec![];
    if payload.owner_id.is_none() {
        missing.push("owner_id");
    }
    if payload.title.as_deref().map_or(true, |s| s.trim().is_empty()) {
        missing.push("title");
    }
    if payload
        .message
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("message");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let pool = DatabaseManager::pool().await?;
    let now = Utc::now();
    let record = Notification {
        id: Uuid::new_v4(),
        owner_id: payload.owner_id.unwrap(),
        notification_type: NotificationType::System.as_str().to_string(),
        title: payload.title.unwrap().trim().to_string(),
        message: payload.message.unwrap().trim().to_string(),
        is_read: false,
        created_at: now,
    };

    notification::insert(&pool, &record).await?;
    ResponseCache::instance()
        .invalidate_prefix(notification::TABLE)
        .await;

    Ok(ApiResponse::created(to_json(record)?))
}

/// GET /api/notifications/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Notification> {
    let pool = DatabaseManager::pool().await?;
    let record: Notification = query::find_by_id(&pool, notification::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    if record.owner_id != auth_user.id {
        return Err(ApiError::not_found("Notification not found"));
    }

    Ok(ApiResponse::success(record))
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotification {
    pub is_read: Option<bool>,
}

/// PATCH /api/notifications/:id - Toggle the read flag
pub async fn update(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateNotification>,
) -> ApiResult<Notification> {
    let pool = DatabaseManager::pool().await?;
    let existing: Notification = query::find_by_id(&pool, notification::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    if existing.owner_id != auth_user.id {
        return Err(ApiError::forbidden("You do not have access to this record"));
    }

    let Some(is_read) = payload.is_read else {
        return Ok(ApiResponse::success(existing));
    };

    // Notifications carry no updated_at; the read flag is the only mutation
    let updated: Vec<Notification> = query::fetch_many(
        &pool,
        "UPDATE notifications SET is_read = $1 WHERE id = $2 RETURNING *",
        vec![Param::Bool(is_read), Param::Uuid(id)],
    )
    .await?;
    ResponseCache::instance()
        .invalidate_prefix(notification::TABLE)
        .await;

    updated
        .into_iter()
        .next()
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found("Notification not found"))
}

/// DELETE /api/notifications/:id - Hard delete of an own notification
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let existing: Notification = query::find_by_id(&pool, notification::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    if existing.owner_id != auth_user.id {
        return Err(ApiError::forbidden("You do not have access to this record"));
    }

    query::execute(
        &pool,
        "DELETE FROM notifications WHERE id = $1",
        vec![Param::Uuid(id)],
    )
    .await?;
    ResponseCache::instance()
        .invalidate_prefix(notification::TABLE)
        .await;

    Ok(ApiResponse::success(json!({ "deleted": id })))
}

/// POST /api/notifications/bulk - delete | mark_read | mark_unread
pub async fn bulk(
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<Value> {
    let action = request.action()?;
    let ids = request.require_ids()?.to_vec();
    let pool = DatabaseManager::pool().await?;

    let outcome = match action {
        BulkAction::MarkRead | BulkAction::MarkUnread => {
            // Partial authorization: unowned ids silently contribute nothing
            let is_read = action == BulkAction::MarkRead;
            let affected = query::execute(
                &pool,
                "UPDATE notifications SET is_read = $1 WHERE id = ANY($2) AND owner_id = $3",
                vec![
                    Param::Bool(is_read),
                    Param::UuidArray(ids.clone()),
                    Param::Uuid(auth_user.id),
                ],
            )
            .await?;
            BulkOutcome::new(action, affected)
        }
        BulkAction::Delete => {
            let scope = Scope::owner_only(auth_user.id, auth_user.role);
            let records: Vec<Notification> =
                query::fetch_by_ids(&pool, notification::TABLE, &ids).await?;
            let ownerships: Vec<(Uuid, Option<Uuid>)> =
                records.iter().map(|n| (n.owner_id, None)).collect();
            ensure_bulk_scope(scope, &ids, &ownerships)?;

            let affected = query::execute(
                &pool,
                "DELETE FROM notifications WHERE id = ANY($1)",
                vec![Param::UuidArray(ids.clone())],
            )
            .await?;
            BulkOutcome::new(action, affected)
        }
        other => {
            return Err(ApiError::invalid_action(format!(
                "Action '{}' is not supported for notifications",
                other
            )))
        }
    };

    ResponseCache::instance()
        .invalidate_prefix(notification::TABLE)
        .await;

    Ok(ApiResponse::success(to_json(outcome)?))
}
