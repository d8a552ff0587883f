//! Document endpoints.
//!
//! Documents soft-delete: removal flips status to "deleted" and the row
//! stays in the table. Listing hides deleted rows unless they are asked for
//! explicitly by status filter.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::{self, ResponseCache};
use crate::database::manager::DatabaseManager;
use crate::database::models::document::{self, Document};
use crate::database::query::{
    self, clamp_limit, clamp_page, Pagination, Param, SelectBuilder, UpdateBuilder,
};
use crate::domain::bulk::{BulkAction, BulkOutcome, BulkRequest};
use crate::domain::export::{Export, ExportFormat, ExportRow};
use crate::domain::role::Scope;
use crate::domain::status::{DocumentStatus, StatusFlow};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::notifications;

use super::{ensure_bulk_scope, ensure_can_mutate, resolve_owner, to_json};

const RESOURCE: &str = "document";

#[derive(Debug, Deserialize, Serialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub owner_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// GET /api/documents
pub async fn list(
    Query(params): Query<ListQuery>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let scope = Scope::owner_only(auth_user.id, auth_user.role);
    let cache_key = cache::list_key(document::TABLE, auth_user.id, auth_user.role, &params);
    let response_cache = ResponseCache::instance();

    if let Some(hit) = response_cache.get(&cache_key).await {
        if let Ok(pagination) = serde_json::from_value::<Pagination>(hit["pagination"].clone()) {
            return Ok(ApiResponse::paginated(hit["data"].clone(), pagination));
        }
    }

    let status_filter = params
        .status
        .as_deref()
        .map(|s| s.parse::<DocumentStatus>())
        .transpose()?;
    let owner_filter = if scope.is_unrestricted() {
        params.owner_id
    } else {
        None
    };
    let page = clamp_page(params.page);
    let limit = clamp_limit(params.limit);

    let mut builder = SelectBuilder::new(document::TABLE)
        .scope(scope, None)
        .eq_opt("category", params.category.clone().map(Param::Str))
        .eq_opt("owner_id", owner_filter.map(Param::Uuid))
        .search(document::SEARCH_COLUMNS, params.search.as_deref())
        .date_range("created_at", params.from, params.to)
        .paginate(page, limit);

    // Soft-deleted rows are hidden unless explicitly requested
    builder = match status_filter {
        Some(status) => builder.eq("status", Param::Str(status.as_str().to_string())),
        None => builder.not_eq(
            "status",
            Param::Str(DocumentStatus::Deleted.as_str().to_string()),
        ),
    };

    let pool = DatabaseManager::pool().await?;
    let items: Vec<Document> = builder.fetch(&pool).await?;
    let total = builder.count(&pool).await?;
    let pagination = Pagination::new(page, limit, total);

    let data = to_json(&items)?;
    response_cache
        .put(cache_key, json!({ "data": data, "pagination": pagination }))
        .await;

    Ok(ApiResponse::paginated(data, pagination))
}

#[derive(Debug, Deserialize)]
pub struct CreateDocument {
    pub title: Option<String>,
    pub category: Option<String>,
    pub file_name: Option<String>,
    pub owner_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// POST /api/documents
pub async fn create(
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateDocument>,
) -> ApiResult<Document> {
    let mut missing = vec![];
    if payload.title.as_deref().map_or(true, |s| s.trim().is_empty()) {
        missing.push("title");
    }
    if payload
        .category
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("category");
    }
    if payload
        .file_name
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("file_name");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let owner_id = resolve_owner(&auth_user, payload.owner_id)?;
    let pool = DatabaseManager::pool().await?;

    let now = Utc::now();
    let record = Document {
        id: Uuid::new_v4(),
        owner_id,
        title: payload.title.unwrap().trim().to_string(),
        category: payload.category.unwrap().trim().to_lowercase(),
        file_name: payload.file_name.unwrap().trim().to_string(),
        status: DocumentStatus::Active.as_str().to_string(),
        notes: payload.notes,
        created_at: now,
        updated_at: now,
    };

    document::insert(&pool, &record).await?;
    ResponseCache::instance()
        .invalidate_prefix(document::TABLE)
        .await;

    Ok(ApiResponse::created(record))
}

/// GET /api/documents/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Document> {
    let pool = DatabaseManager::pool().await?;
    let record: Document = query::find_by_id(&pool, document::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;

    let scope = Scope::owner_only(auth_user.id, auth_user.role);
    if !scope.permits(record.owner_id, None) {
        return Err(ApiError::not_found("Document not found"));
    }

    Ok(ApiResponse::success(record))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocument {
    pub title: Option<String>,
    pub category: Option<String>,
    pub file_name: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// PATCH /api/documents/:id
pub async fn update(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateDocument>,
) -> ApiResult<Document> {
    let pool = DatabaseManager::pool().await?;
    let existing: Document = query::find_by_id(&pool, document::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, None)?;

    let mut builder = UpdateBuilder::new()
        .set_opt("title", payload.title.map(Param::Str))
        .set_opt(
            "category",
            payload.category.map(|c| Param::Str(c.to_lowercase())),
        )
        .set_opt("file_name", payload.file_name.map(Param::Str))
        .set_opt("notes", payload.notes.map(Param::Str));

    let mut status_change: Option<DocumentStatus> = None;
    if let Some(next) = payload.status.as_deref() {
        let next: DocumentStatus = next.parse()?;
        let current: DocumentStatus = existing.status.parse()?;
        if next != current {
            current.transition(next)?;
            status_change = Some(next);
            builder = builder.set("status", Param::Str(next.as_str().to_string()));
        }
    }

    if builder.is_empty() {
        return Ok(ApiResponse::success(existing));
    }

    let updated: Document = builder.execute_returning(&pool, document::TABLE, id).await?;
    ResponseCache::instance()
        .invalidate_prefix(document::TABLE)
        .await;

    if let Some(next) = status_change {
        notifications::status_changed(&pool, updated.owner_id, RESOURCE, next.as_str()).await;
    }

    Ok(ApiResponse::success(updated))
}

/// DELETE /api/documents/:id - Soft delete via the status flag
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let existing: Document = query::find_by_id(&pool, document::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, None)?;

    let current: DocumentStatus = existing.status.parse()?;
    // Deleting twice is a state conflict, same as any other bad transition
    current.transition(DocumentStatus::Deleted)?;

    query::execute(
        &pool,
        "UPDATE documents SET status = 'deleted', updated_at = NOW() WHERE id = $1",
        vec![Param::Uuid(id)],
    )
    .await?;
    ResponseCache::instance()
        .invalidate_prefix(document::TABLE)
        .await;

    Ok(ApiResponse::success(json!({ "deleted": id })))
}

/// POST /api/documents/bulk - delete | update_status | export
pub async fn bulk(
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<Value> {
    let action = request.action()?;
    let ids = request.require_ids()?.to_vec();
    let pool = DatabaseManager::pool().await?;
    let scope = Scope::owner_only(auth_user.id, auth_user.role);

    let records: Vec<Document> = query::fetch_by_ids(&pool, document::TABLE, &ids).await?;
    let ownerships: Vec<(Uuid, Option<Uuid>)> =
        records.iter().map(|d| (d.owner_id, None)).collect();
    ensure_bulk_scope(scope, &ids, &ownerships)?;

    let outcome = match action {
        BulkAction::Delete => {
            let affected = query::execute(
                &pool,
                "UPDATE documents SET status = 'deleted', updated_at = NOW()
                 WHERE id = ANY($1) AND status <> 'deleted'",
                vec![Param::UuidArray(ids.clone())],
            )
            .await?;
            BulkOutcome::new(action, affected)
        }
        BulkAction::UpdateStatus => {
            let target: DocumentStatus = request
                .status
                .as_deref()
                .ok_or_else(|| {
                    ApiError::validation("'status' is required for update_status", None)
                })?
                .parse()?;
            let applicable: Vec<Uuid> = records
                .iter()
                .filter(|d| {
                    d.status
                        .parse::<DocumentStatus>()
                        .map_or(false, |current| current.can_transition(target))
                })
                .map(|d| d.id)
                .collect();
            let affected = if applicable.is_empty() {
                0
            } else {
                query::execute(
                    &pool,
                    "UPDATE documents SET status = $1, updated_at = NOW() WHERE id = ANY($2)",
                    vec![
                        Param::Str(target.as_str().to_string()),
                        Param::UuidArray(applicable),
                    ],
                )
                .await?
            };
            BulkOutcome::new(action, affected)
        }
        BulkAction::Export => {
            let format = ExportFormat::parse(request.format.as_deref())?;
            let export = Export::build("documents", format, export_rows(&records));
            return Ok(ApiResponse::success(to_json(export)?));
        }
        other => {
            return Err(ApiError::invalid_action(format!(
                "Action '{}' is not supported for documents",
                other
            )))
        }
    };

    ResponseCache::instance()
        .invalidate_prefix(document::TABLE)
        .await;

    Ok(ApiResponse::success(to_json(outcome)?))
}

fn export_rows(records: &[Document]) -> Vec<ExportRow> {
    let mut rows = vec![];
    for record in records {
        rows.push(ExportRow::new("Document ID", record.id.to_string()));
        rows.push(ExportRow::new("Title", record.title.clone()));
        rows.push(ExportRow::new("Category", record.category.clone()));
        rows.push(ExportRow::new("File Name", record.file_name.clone()));
        rows.push(ExportRow::new("Status", record.status.clone()));
        rows.push(ExportRow::new("Created", record.created_at.to_rfc3339()));
    }
    rows
}
