//! Consultation endpoints.
//!
//! Scheduling a consultation queues a reminder notification through the
//! simulation service; the pending timer is process-local.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::{self, ResponseCache};
use crate::database::manager::DatabaseManager;
use crate::database::models::consultation::{self, Consultation};
use crate::database::query::{
    self, clamp_limit, clamp_page, Pagination, Param, SelectBuilder, UpdateBuilder,
};
use crate::domain::bulk::{BulkAction, BulkOutcome, BulkRequest};
use crate::domain::export::{Export, ExportFormat, ExportRow};
use crate::domain::role::Scope;
use crate::domain::status::{ConsultationStatus, StatusFlow};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{notifications, simulation};

use super::{ensure_bulk_scope, ensure_can_mutate, resolve_owner, to_json, validate_assignee};

const RESOURCE: &str = "consultation";

#[derive(Debug, Deserialize, Serialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub owner_id: Option<Uuid>,
    pub consultant_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// GET /api/consultations
pub async fn list(
    Query(params): Query<ListQuery>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let scope = Scope::for_user(auth_user.id, auth_user.role);
    let cache_key = cache::list_key(consultation::TABLE, auth_user.id, auth_user.role, &params);
    let response_cache = ResponseCache::instance();

    if let Some(hit) = response_cache.get(&cache_key).await {
        if let Ok(pagination) = serde_json::from_value::<Pagination>(hit["pagination"].clone()) {
            return Ok(ApiResponse::paginated(hit["data"].clone(), pagination));
        }
    }

    let status_filter = params
        .status
        .as_deref()
        .map(|s| s.parse::<ConsultationStatus>())
        .transpose()?;
    let owner_filter = if scope.is_unrestricted() {
        params.owner_id
    } else {
        None
    };
    let page = clamp_page(params.page);
    let limit = clamp_limit(params.limit);

    let builder = SelectBuilder::new(consultation::TABLE)
        .scope(scope, Some("consultant_id"))
        .eq_opt(
            "status",
            status_filter.map(|s| Param::Str(s.as_str().to_string())),
        )
        .eq_opt("owner_id", owner_filter.map(Param::Uuid))
        .eq_opt("consultant_id", params.consultant_id.map(Param::Uuid))
        .search(consultation::SEARCH_COLUMNS, params.search.as_deref())
        .date_range("created_at", params.from, params.to)
        .paginate(page, limit);

    let pool = DatabaseManager::pool().await?;
    let items: Vec<Consultation> = builder.fetch(&pool).await?;
    let total = builder.count(&pool).await?;
    let pagination = Pagination::new(page, limit, total);

    let data = to_json(&items)?;
    response_cache
        .put(cache_key, json!({ "data": data, "pagination": pagination }))
        .await;

    Ok(ApiResponse::paginated(data, pagination))
}

#[derive(Debug, Deserialize)]
pub struct CreateConsultation {
    pub topic: Option<String>,
    pub owner_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// POST /api/consultations - Request a consultation
pub async fn create(
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateConsultation>,
) -> ApiResult<Consultation> {
    if payload.topic.as_deref().map_or(true, |s| s.trim().is_empty()) {
        return Err(ApiError::missing_fields(&["topic"]));
    }

    let owner_id = resolve_owner(&auth_user, payload.owner_id)?;
    let pool = DatabaseManager::pool().await?;

    let now = Utc::now();
    let record = Consultation {
        id: Uuid::new_v4(),
        owner_id,
        consultant_id: None,
        topic: payload.topic.unwrap().trim().to_string(),
        status: ConsultationStatus::Requested.as_str().to_string(),
        scheduled_at: None,
        notes: payload.notes,
        created_at: now,
        updated_at: now,
    };

    consultation::insert(&pool, &record).await?;
    ResponseCache::instance()
        .invalidate_prefix(consultation::TABLE)
        .await;

    Ok(ApiResponse::created(record))
}

/// GET /api/consultations/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Consultation> {
    let pool = DatabaseManager::pool().await?;
    let record: Consultation = query::find_by_id(&pool, consultation::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Consultation not found"))?;

    let scope = Scope::for_user(auth_user.id, auth_user.role);
    if !scope.permits(record.owner_id, record.consultant_id) {
        return Err(ApiError::not_found("Consultation not found"));
    }

    Ok(ApiResponse::success(record))
}

#[derive(Debug, Deserialize)]
pub struct UpdateConsultation {
    pub topic: Option<String>,
    pub status: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub consultant_id: Option<Uuid>,
}

/// PATCH /api/consultations/:id
pub async fn update(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateConsultation>,
) -> ApiResult<Consultation> {
    let pool = DatabaseManager::pool().await?;
    let existing: Consultation = query::find_by_id(&pool, consultation::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Consultation not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, existing.consultant_id)?;

    let mut builder = UpdateBuilder::new()
        .set_opt("topic", payload.topic.map(Param::Str))
        .set_opt("notes", payload.notes.map(Param::Str))
        .set_opt("scheduled_at", payload.scheduled_at.map(Param::Timestamp));

    let mut status_change: Option<ConsultationStatus> = None;
    if let Some(next) = payload.status.as_deref() {
        let next: ConsultationStatus = next.parse()?;
        let current: ConsultationStatus = existing.status.parse()?;
        if next != current {
            current.transition(next)?;
            if next == ConsultationStatus::Scheduled
                && payload.scheduled_at.or(existing.scheduled_at).is_none()
            {
                return Err(ApiError::validation(
                    "'scheduled_at' is required to schedule a consultation",
                    None,
                ));
            }
            status_change = Some(next);
            builder = builder.set("status", Param::Str(next.as_str().to_string()));
        }
    }

    let mut new_assignee: Option<Uuid> = None;
    if let Some(assignee) = payload.consultant_id {
        if !auth_user.role.is_privileged() {
            return Err(ApiError::forbidden(
                "Only tax officers may assign consultants",
            ));
        }
        validate_assignee(&pool, assignee).await?;
        if existing.consultant_id != Some(assignee) {
            new_assignee = Some(assignee);
        }
        builder = builder.set("consultant_id", Param::Uuid(assignee));
    }

    if builder.is_empty() {
        return Ok(ApiResponse::success(existing));
    }

    let updated: Consultation = builder
        .execute_returning(&pool, consultation::TABLE, id)
        .await?;
    ResponseCache::instance()
        .invalidate_prefix(consultation::TABLE)
        .await;

    if let Some(next) = status_change {
        notifications::status_changed(&pool, updated.owner_id, RESOURCE, next.as_str()).await;
        if next == ConsultationStatus::Scheduled {
            simulation::schedule_consultation_reminder(
                updated.id,
                updated.owner_id,
                updated.topic.clone(),
            );
        }
    }
    if let Some(assignee) = new_assignee {
        notifications::assigned(&pool, assignee, RESOURCE).await;
    }

    Ok(ApiResponse::success(updated))
}

/// DELETE /api/consultations/:id - Hard delete
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let existing: Consultation = query::find_by_id(&pool, consultation::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Consultation not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, existing.consultant_id)?;

    query::execute(
        &pool,
        "DELETE FROM consultations WHERE id = $1",
        vec![Param::Uuid(id)],
    )
    .await?;
    ResponseCache::instance()
        .invalidate_prefix(consultation::TABLE)
        .await;

    Ok(ApiResponse::success(json!({ "deleted": id })))
}

/// POST /api/consultations/bulk - delete | assign | schedule | update_status | export
pub async fn bulk(
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<Value> {
    let action = request.action()?;
    let ids = request.require_ids()?.to_vec();
    let pool = DatabaseManager::pool().await?;
    let scope = Scope::for_user(auth_user.id, auth_user.role);

    let records: Vec<Consultation> = query::fetch_by_ids(&pool, consultation::TABLE, &ids).await?;
    let ownerships: Vec<(Uuid, Option<Uuid>)> = records
        .iter()
        .map(|c| (c.owner_id, c.consultant_id))
        .collect();
    ensure_bulk_scope(scope, &ids, &ownerships)?;

    let outcome = match action {
        BulkAction::Delete => {
            let affected = query::execute(
                &pool,
                "DELETE FROM consultations WHERE id = ANY($1)",
                vec![Param::UuidArray(ids.clone())],
            )
            .await?;
            BulkOutcome::new(action, affected)
        }
        BulkAction::Schedule => {
            let when = request.scheduled_at.ok_or_else(|| {
                ApiError::validation("'scheduled_at' is required for schedule", None)
            })?;
            let applicable: Vec<&Consultation> = records
                .iter()
                .filter(|c| {
                    c.status
                        .parse::<ConsultationStatus>()
                        .map_or(false, |s| s.can_transition(ConsultationStatus::Scheduled))
                })
                .collect();
            let applicable_ids: Vec<Uuid> = applicable.iter().map(|c| c.id).collect();
            let affected = if applicable_ids.is_empty() {
                0
            } else {
                query::execute(
                    &pool,
                    "UPDATE consultations SET status = 'scheduled', scheduled_at = $1,
                     updated_at = NOW() WHERE id = ANY($2)",
                    vec![Param::Timestamp(when), Param::UuidArray(applicable_ids)],
                )
                .await?
            };
            for record in &applicable {
                simulation::schedule_consultation_reminder(
                    record.id,
                    record.owner_id,
                    record.topic.clone(),
                );
            }
            BulkOutcome::new(action, affected)
        }
        BulkAction::UpdateStatus => {
            let target: ConsultationStatus = request
                .status
                .as_deref()
                .ok_or_else(|| {
                    ApiError::validation("'status' is required for update_status", None)
                })?
                .parse()?;
            let applicable: Vec<Uuid> = records
                .iter()
                .filter(|c| {
                    c.status
                        .parse::<ConsultationStatus>()
                        .map_or(false, |current| current.can_transition(target))
                })
                .map(|c| c.id)
                .collect();
            let affected = if applicable.is_empty() {
                0
            } else {
                query::execute(
                    &pool,
                    "UPDATE consultations SET status = $1, updated_at = NOW() WHERE id = ANY($2)",
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
                    "Only tax officers may assign consultants",
                ));
            }
            let assignee = request.assigned_to.ok_or_else(|| {
                ApiError::validation("'assigned_to' is required for assign", None)
            })?;
            validate_assignee(&pool, assignee).await?;
            let affected = query::execute(
                &pool,
                "UPDATE consultations SET consultant_id = $1, updated_at = NOW()
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
            let export = Export::build("consultations", format, export_rows(&records));
            return Ok(ApiResponse::success(to_json(export)?));
        }
        other => {
            return Err(ApiError::invalid_action(format!(
                "Action '{}' is not supported for consultations",
                other
            )))
        }
    };

    ResponseCache::instance()
        .invalidate_prefix(consultation::TABLE)
        .await;

    Ok(ApiResponse::success(to_json(outcome)?))
}

fn export_rows(records: &[Consultation]) -> Vec<ExportRow> {
    let mut rows = vec![];
    for record in records {
        rows.push(ExportRow::new("Consultation ID", record.id.to_string()));
        rows.push(ExportRow::new("Topic", record.topic.clone()));
        rows.push(ExportRow::new("Status", record.status.clone()));
        rows.push(ExportRow::new(
            "Scheduled At",
            record
                .scheduled_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        ));
        rows.push(ExportRow::new("Created", record.created_at.to_rfc3339()));
    }
    rows
}
