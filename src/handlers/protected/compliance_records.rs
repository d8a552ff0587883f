//! Compliance-record endpoints.
//!
//! Compliance records track filing obligations; deletion is restricted to
//! privileged roles so an owner cannot erase their own non-compliance.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::{self, ResponseCache};
use crate::database::manager::DatabaseManager;
use crate::database::models::compliance_record::{self, ComplianceRecord};
use crate::database::query::{
    self, clamp_limit, clamp_page, Pagination, Param, SelectBuilder, SortDirection, UpdateBuilder,
};
use crate::domain::bulk::{BulkAction, BulkOutcome, BulkRequest};
use crate::domain::export::{Export, ExportFormat, ExportRow};
use crate::domain::role::Scope;
use crate::domain::status::{ComplianceStatus, StatusFlow};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::notifications;

use super::{ensure_bulk_scope, ensure_can_mutate, resolve_owner, to_json, validate_assignee};

const RESOURCE: &str = "compliance record";

#[derive(Debug, Deserialize, Serialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub period: Option<String>,
    pub owner_id: Option<Uuid>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,
}

/// GET /api/compliance-records
pub async fn list(
    Query(params): Query<ListQuery>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let scope = Scope::for_user(auth_user.id, auth_user.role);
    let cache_key = cache::list_key(
        compliance_record::TABLE,
        auth_user.id,
        auth_user.role,
        &params,
    );
    let response_cache = ResponseCache::instance();

    if let Some(hit) = response_cache.get(&cache_key).await {
        if let Ok(pagination) = serde_json::from_value::<Pagination>(hit["pagination"].clone()) {
            return Ok(ApiResponse::paginated(hit["data"].clone(), pagination));
        }
    }

    let status_filter = params
        .status
        .as_deref()
        .map(|s| s.parse::<ComplianceStatus>())
        .transpose()?;
    let owner_filter = if scope.is_unrestricted() {
        params.owner_id
    } else {
        None
    };
    let page = clamp_page(params.page);
    let limit = clamp_limit(params.limit);

    let builder = SelectBuilder::new(compliance_record::TABLE)
        .scope(scope, Some("assigned_to"))
        .eq_opt(
            "status",
            status_filter.map(|s| Param::Str(s.as_str().to_string())),
        )
        .eq_opt("period", params.period.clone().map(Param::Str))
        .eq_opt("owner_id", owner_filter.map(Param::Uuid))
        .search(compliance_record::SEARCH_COLUMNS, params.search.as_deref())
        .date_range("due_date", params.due_after, params.due_before)
        // Nearest deadline first
        .order("due_date", SortDirection::Asc)
        .paginate(page, limit);

    let pool = DatabaseManager::pool().await?;
    let items: Vec<ComplianceRecord> = builder.fetch(&pool).await?;
    let total = builder.count(&pool).await?;
    let pagination = Pagination::new(page, limit, total);

    let data = to_json(&items)?;
    response_cache
        .put(cache_key, json!({ "data": data, "pagination": pagination }))
        .await;

    Ok(ApiResponse::paginated(data, pagination))
}

#[derive(Debug, Deserialize)]
pub struct CreateComplianceRecord {
    pub requirement: Option<String>,
    pub period: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub owner_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// POST /api/compliance-records
pub async fn create(
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateComplianceRecord>,
) -> ApiResult<ComplianceRecord> {
    let mut missing = vec![];
    if payload
        .requirement
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("requirement");
    }
    if payload
        .period
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("period");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let owner_id = resolve_owner(&auth_user, payload.owner_id)?;
    let pool = DatabaseManager::pool().await?;

    let now = Utc::now();
    let record = ComplianceRecord {
        id: Uuid::new_v4(),
        owner_id,
        assigned_to: None,
        requirement: payload.requirement.unwrap().trim().to_string(),
        period: payload.period.unwrap().trim().to_string(),
        due_date: payload.due_date,
        status: ComplianceStatus::Open.as_str().to_string(),
        notes: payload.notes,
        created_at: now,
        updated_at: now,
    };

    compliance_record::insert(&pool, &record).await?;
    ResponseCache::instance()
        .invalidate_prefix(compliance_record::TABLE)
        .await;

    Ok(ApiResponse::created(record))
}

/// GET /api/compliance-records/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<ComplianceRecord> {
    let pool = DatabaseManager::pool().await?;
    let record: ComplianceRecord = query::find_by_id(&pool, compliance_record::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Compliance record not found"))?;

    let scope = Scope::for_user(auth_user.id, auth_user.role);
    if !scope.permits(record.owner_id, record.assigned_to) {
        return Err(ApiError::not_found("Compliance record not found"));
    }

    Ok(ApiResponse::success(record))
}

#[derive(Debug, Deserialize)]
pub struct UpdateComplianceRecord {
    pub requirement: Option<String>,
    pub period: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
}

/// PATCH /api/compliance-records/:id
pub async fn update(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateComplianceRecord>,
) -> ApiResult<ComplianceRecord> {
    let pool = DatabaseManager::pool().await?;
    let existing: ComplianceRecord = query::find_by_id(&pool, compliance_record::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Compliance record not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, existing.assigned_to)?;

    let mut builder = UpdateBuilder::new()
        .set_opt("requirement", payload.requirement.map(Param::Str))
        .set_opt("period", payload.period.map(Param::Str))
        .set_opt("due_date", payload.due_date.map(Param::Timestamp))
        .set_opt("notes", payload.notes.map(Param::Str));

    let mut status_change: Option<ComplianceStatus> = None;
    if let Some(next) = payload.status.as_deref() {
        let next: ComplianceStatus = next.parse()?;
        let current: ComplianceStatus = existing.status.parse()?;
        if next != current {
            current.transition(next)?;
            status_change = Some(next);
            builder = builder.set("status", Param::Str(next.as_str().to_string()));
        }
    }

    let mut new_assignee: Option<Uuid> = None;
    if let Some(assignee) = payload.assigned_to {
        if !auth_user.role.is_privileged() {
            return Err(ApiError::forbidden(
                "Only tax officers may assign compliance records",
            ));
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

    let updated: ComplianceRecord = builder
        .execute_returning(&pool, compliance_record::TABLE, id)
        .await?;
    ResponseCache::instance()
        .invalidate_prefix(compliance_record::TABLE)
        .await;

    if let Some(next) = status_change {
        notifications::status_changed(&pool, updated.owner_id, RESOURCE, next.as_str()).await;
    }
    if let Some(assignee) = new_assignee {
        notifications::assigned(&pool, assignee, RESOURCE).await;
    }

    Ok(ApiResponse::success(updated))
}

/// DELETE /api/compliance-records/:id - Privileged roles only
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    if !auth_user.role.is_privileged() {
        return Err(ApiError::forbidden(
            "Only tax officers may delete compliance records",
        ));
    }

    let pool = DatabaseManager::pool().await?;
    let _existing: ComplianceRecord = query::find_by_id(&pool, compliance_record::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Compliance record not found"))?;

    query::execute(
        &pool,
        "DELETE FROM compliance_records WHERE id = $1",
        vec![Param::Uuid(id)],
    )
    .await?;
    ResponseCache::instance()
        .invalidate_prefix(compliance_record::TABLE)
        .await;

    Ok(ApiResponse::success(json!({ "deleted": id })))
}

/// POST /api/compliance-records/bulk - assign | update_status | export
pub async fn bulk(
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<Value> {
    let action = request.action()?;
    let ids = request.require_ids()?.to_vec();
    let pool = DatabaseManager::pool().await?;
    let scope = Scope::for_user(auth_user.id, auth_user.role);

    let records: Vec<ComplianceRecord> =
        query::fetch_by_ids(&pool, compliance_record::TABLE, &ids).await?;
    let ownerships: Vec<(Uuid, Option<Uuid>)> = records
        .iter()
        .map(|r| (r.owner_id, r.assigned_to))
        .collect();
    ensure_bulk_scope(scope, &ids, &ownerships)?;

    let outcome = match action {
        BulkAction::UpdateStatus => {
            let target: ComplianceStatus = request
                .status
                .as_deref()
                .ok_or_else(|| {
                    ApiError::validation("'status' is required for update_status", None)
                })?
                .parse()?;
            let applicable: Vec<Uuid> = records
                .iter()
                .filter(|r| {
                    r.status
                        .parse::<ComplianceStatus>()
                        .map_or(false, |current| current.can_transition(target))
                })
                .map(|r| r.id)
                .collect();
            let affected = if applicable.is_empty() {
                0
            } else {
                query::execute(
                    &pool,
                    "UPDATE compliance_records SET status = $1, updated_at = NOW()
                     WHERE id = ANY($2)",
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
                return Err(ApiError::forbidden(
                    "Only tax officers may assign compliance records",
                ));
            }
            let assignee = request.assigned_to.ok_or_else(|| {
                ApiError::validation("'assigned_to' is required for assign", None)
            })?;
            validate_assignee(&pool, assignee).await?;
            let affected = query::execute(
                &pool,
                "UPDATE compliance_records SET assigned_to = $1, updated_at = NOW()
                 WHERE id = ANY($2)",
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
            let export = Export::build("compliance-records", format, export_rows(&records));
            return Ok(ApiResponse::success(to_json(export)?));
        }
        other => {
            return Err(ApiError::invalid_action(format!(
                "Action '{}' is not supported for compliance records",
                other
            )))
        }
    };

    ResponseCache::instance()
        .invalidate_prefix(compliance_record::TABLE)
        .await;

    Ok(ApiResponse::success(to_json(outcome)?))
}

fn export_rows(records: &[ComplianceRecord]) -> Vec<ExportRow> {
    let mut rows = vec![];
    for record in records {
        rows.push(ExportRow::new("Record ID", record.id.to_string()));
        rows.push(ExportRow::new("Requirement", record.requirement.clone()));
        rows.push(ExportRow::new("Period", record.period.clone()));
        rows.push(ExportRow::new(
            "Due Date",
            record.due_date.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ));
        rows.push(ExportRow::new("Status", record.status.clone()));
        rows.push(ExportRow::new("Created", record.created_at.to_rfc3339()));
    }
    rows
}
