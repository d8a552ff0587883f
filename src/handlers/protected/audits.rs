//! Tax-audit endpoints.
//!
//! Audits are hard-delete records with a state-dependent rule: only planned
//! audits may be removed.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::{self, ResponseCache};
use crate::database::manager::DatabaseManager;
use crate::database::models::audit::{self, Audit};
use crate::database::query::{
    self, clamp_limit, clamp_page, Pagination, Param, SelectBuilder, UpdateBuilder,
};
use crate::domain::bulk::{BulkAction, BulkOutcome, BulkRequest};
use crate::domain::export::{Export, ExportFormat, ExportRow};
use crate::domain::role::Scope;
use crate::domain::status::{AuditStatus, StatusFlow};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::notifications;

use super::{ensure_bulk_scope, ensure_can_mutate, resolve_owner, to_json, validate_assignee};

const RESOURCE: &str = "audit";

#[derive(Debug, Deserialize, Serialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub audit_type: Option<String>,
    pub tax_year: Option<i32>,
    pub owner_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// GET /api/audits - Filtered, paginated list within the caller's scope
pub async fn list(
    Query(params): Query<ListQuery>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let scope = Scope::for_user(auth_user.id, auth_user.role);
    let cache_key = cache::list_key(audit::TABLE, auth_user.id, auth_user.role, &params);
    let response_cache = ResponseCache::instance();

    if let Some(hit) = response_cache.get(&cache_key).await {
        if let Ok(pagination) = serde_json::from_value::<Pagination>(hit["pagination"].clone()) {
            return Ok(ApiResponse::paginated(hit["data"].clone(), pagination));
        }
    }

    let status_filter = params
        .status
        .as_deref()
        .map(|s| s.parse::<AuditStatus>())
        .transpose()?;
    // Owner filters from non-privileged callers are discarded, not honored
    let owner_filter = if scope.is_unrestricted() {
        params.owner_id
    } else {
        None
    };
    let page = clamp_page(params.page);
    let limit = clamp_limit(params.limit);

    let builder = SelectBuilder::new(audit::TABLE)
        .scope(scope, Some("assigned_to"))
        .eq_opt(
            "status",
            status_filter.map(|s| Param::Str(s.as_str().to_string())),
        )
        .eq_opt("audit_type", params.audit_type.clone().map(Param::Str))
        .eq_opt("tax_year", params.tax_year.map(|y| Param::Int(y as i64)))
        .eq_opt("owner_id", owner_filter.map(Param::Uuid))
        .search(audit::SEARCH_COLUMNS, params.search.as_deref())
        .date_range("created_at", params.from, params.to)
        .paginate(page, limit);

    let pool = DatabaseManager::pool().await?;
    let items: Vec<Audit> = builder.fetch(&pool).await?;
    let total = builder.count(&pool).await?;
    let pagination = Pagination::new(page, limit, total);

    let data = to_json(&items)?;
    response_cache
        .put(cache_key, json!({ "data": data, "pagination": pagination }))
        .await;

    Ok(ApiResponse::paginated(data, pagination))
}

#[derive(Debug, Deserialize)]
pub struct CreateAudit {
    pub audit_type: Option<String>,
    pub tax_year: Option<i32>,
    pub owner_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// POST /api/audits - Open a new audit in planned state
pub async fn create(
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateAudit>,
) -> ApiResult<Audit> {
    let mut missing = vec![];
    if payload
        .audit_type
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("audit_type");
    }
    if payload.tax_year.is_none() {
        missing.push("tax_year");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let owner_id = resolve_owner(&auth_user, payload.owner_id)?;
    let pool = DatabaseManager::pool().await?;

    if let Some(assignee) = payload.assigned_to {
        if !auth_user.role.is_privileged() {
            return Err(ApiError::forbidden("Only tax officers may assign audits"));
        }
        validate_assignee(&pool, assignee).await?;
    }

    let now = Utc::now();
    let record = Audit {
        id: Uuid::new_v4(),
        owner_id,
        assigned_to: payload.assigned_to,
        audit_type: payload.audit_type.unwrap().trim().to_string(),
        tax_year: payload.tax_year.unwrap(),
        status: AuditStatus::Planned.as_str().to_string(),
        findings: None,
        notes: payload.notes,
        scheduled_at: payload.scheduled_at,
        created_at: now,
        updated_at: now,
    };

    audit::insert(&pool, &record).await?;
    ResponseCache::instance()
        .invalidate_prefix(audit::TABLE)
        .await;

    if let Some(assignee) = record.assigned_to {
        notifications::assigned(&pool, assignee, RESOURCE).await;
    }

    Ok(ApiResponse::created(record))
}

/// GET /api/audits/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Audit> {
    let pool = DatabaseManager::pool().await?;
    let record: Audit = query::find_by_id(&pool, audit::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Audit not found"))?;

    let scope = Scope::for_user(auth_user.id, auth_user.role);
    if !scope.permits(record.owner_id, record.assigned_to) {
        // Out-of-scope reads don't reveal existence
        return Err(ApiError::not_found("Audit not found"));
    }

    Ok(ApiResponse::success(record))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAudit {
    pub audit_type: Option<String>,
    pub tax_year: Option<i32>,
    pub status: Option<String>,
    pub findings: Option<String>,
    pub notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
}

/// PATCH /api/audits/:id - Sparse patch; absent fields are left untouched
pub async fn update(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateAudit>,
) -> ApiResult<Audit> {
    let pool = DatabaseManager::pool().await?;
    let existing: Audit = query::find_by_id(&pool, audit::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Audit not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, existing.assigned_to)?;

    let mut builder = UpdateBuilder::new()
        .set_opt("audit_type", payload.audit_type.map(Param::Str))
        .set_opt("tax_year", payload.tax_year.map(|y| Param::Int(y as i64)))
        .set_opt("findings", payload.findings.map(Param::Str))
        .set_opt("notes", payload.notes.map(Param::Str))
        .set_opt("scheduled_at", payload.scheduled_at.map(Param::Timestamp));

    let mut status_change: Option<AuditStatus> = None;
    if let Some(next) = payload.status.as_deref() {
        let next: AuditStatus = next.parse()?;
        let current: AuditStatus = existing.status.parse()?;
        if next != current {
            current.transition(next)?;
            status_change = Some(next);
            builder = builder.set("status", Param::Str(next.as_str().to_string()));
        }
    }

    let mut new_assignee: Option<Uuid> = None;
    if let Some(assignee) = payload.assigned_to {
        if !auth_user.role.is_privileged() {
            return Err(ApiError::forbidden("Only tax officers may assign audits"));
        }
        validate_assignee(&pool, assignee).await?;
        if existing.assigned_to != Some(assignee) {
            new_assignee = Some(assignee);
        }
        builder = builder.set("assigned_to", Param::Uuid(assignee));
    }

    if builder.is_empty() {
        return Ok(ApiResponse::success(existing));
    }

    let updated: Audit = builder.execute_returning(&pool, audit::TABLE, id).await?;
    ResponseCache::instance()
        .invalidate_prefix(audit::TABLE)
        .await;

    if let Some(next) = status_change {
        notifications::status_changed(&pool, updated.owner_id, RESOURCE, next.as_str()).await;
    }
    if let Some(assignee) = new_assignee {
        notifications::assigned(&pool, assignee, RESOURCE).await;
    }

    Ok(ApiResponse::success(updated))
}

/// DELETE /api/audits/:id - Hard delete, planned audits only
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let existing: Audit = query::find_by_id(&pool, audit::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Audit not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, existing.assigned_to)?;

    let status: AuditStatus = existing.status.parse()?;
    if !status.is_deletable() {
        return Err(ApiError::conflict(format!(
            "Only planned audits can be deleted (status is '{}')",
            existing.status
        )));
    }

    query::execute(
        &pool,
        "DELETE FROM audits WHERE id = $1",
        vec![Param::Uuid(id)],
    )
    .await?;
    ResponseCache::instance()
        .invalidate_prefix(audit::TABLE)
        .await;

    Ok(ApiResponse::success(json!({ "deleted": id })))
}

/// POST /api/audits/bulk - delete | assign | update_status | export
pub async fn bulk(
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<Value> {
    let action = request.action()?;
    let ids = request.require_ids()?.to_vec();
    let pool = DatabaseManager::pool().await?;
    let scope = Scope::for_user(auth_user.id, auth_user.role);

    let records: Vec<Audit> = query::fetch_by_ids(&pool, audit::TABLE, &ids).await?;
    let ownerships: Vec<(Uuid, Option<Uuid>)> = records
        .iter()
        .map(|a| (a.owner_id, a.assigned_to))
        .collect();
    ensure_bulk_scope(scope, &ids, &ownerships)?;

    let outcome = match action {
        BulkAction::Delete => {
            // Non-planned audits are skipped, mirroring the single-record rule
            let affected = query::execute(
                &pool,
                "DELETE FROM audits WHERE id = ANY($1) AND status = 'planned'",
                vec![Param::UuidArray(ids.clone())],
            )
            .await?;
            BulkOutcome::new(action, affected)
        }
        BulkAction::UpdateStatus => {
            let target: AuditStatus = request
                .status
                .as_deref()
                .ok_or_else(|| {
                    ApiError::validation("'status' is required for update_status", None)
                })?
                .parse()?;
            let applicable: Vec<Uuid> = records
                .iter()
                .filter(|a| {
                    a.status
                        .parse::<AuditStatus>()
                        .map_or(false, |current| current.can_transition(target))
                })
                .map(|a| a.id)
                .collect();
            let affected = if applicable.is_empty() {
                0
            } else {
                query::execute(
                    &pool,
                    "UPDATE audits SET status = $1, updated_at = NOW() WHERE id = ANY($2)",
                    vec![
                        Param::Str(target.as_str().to_string()),
                        Param::UuidArray(applicable),
                    ],
                )
                .await?
            };
            BulkOutcome::new(action, affected)
        }
        BulkAction::Assign => {
            if !auth_user.role.is_privileged() {
                return Err(ApiError::forbidden("Only tax officers may assign audits"));
            }
            let assignee = request.assigned_to.ok_or_else(|| {
                ApiError::validation("'assigned_to' is required for assign", None)
            })?;
            validate_assignee(&pool, assignee).await?;
            let affected = query::execute(
                &pool,
                "UPDATE audits SET assigned_to = $1, updated_at = NOW() WHERE id = ANY($2)",
                vec![Param::Uuid(assignee), Param::UuidArray(ids.clone())],
            )
            .await?;
            if affected > 0 {
                notifications::assigned(&pool, assignee, RESOURCE).await;
            }
            BulkOutcome::new(action, affected)
        }
        BulkAction::Export => {
            let format = ExportFormat::parse(request.format.as_deref())?;
            let export = Export::build("audits", format, export_rows(&records));
            return Ok(ApiResponse::success(to_json(export)?));
        }
        other => {
            return Err(ApiError::invalid_action(format!(
                "Action '{}' is not supported for audits",
                other
            )))
        }
    };

    ResponseCache::instance()
        .invalidate_prefix(audit::TABLE)
        .await;

    Ok(ApiResponse::success(to_json(outcome)?))
}

fn export_rows(records: &[Audit]) -> Vec<ExportRow> {
    let mut rows = vec![];
    for record in records {
        rows.push(ExportRow::new("Audit ID", record.id.to_string()));
        rows.push(ExportRow::new("Audit Type", record.audit_type.clone()));
        rows.push(ExportRow::new("Tax Year", record.tax_year.to_string()));
        rows.push(ExportRow::new("Status", record.status.clone()));
        rows.push(ExportRow::new(
            "Findings",
            record.findings.clone().unwrap_or_default(),
        ));
        rows.push(ExportRow::new("Created", record.created_at.to_rfc3339()));
    }
    rows
}
