//! Bank-account integration endpoints.
//!
//! `status` tracks the integration lifecycle; `sync_status` tracks the
//! simulated statement sync, which completes on a detached timer with no
//! durability guarantee.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::{self, ResponseCache};
use crate::database::manager::DatabaseManager;
use crate::database::models::bank_integration::{self, BankIntegration};
use crate::database::query::{
    self, clamp_limit, clamp_page, Pagination, Param, SelectBuilder, UpdateBuilder,
};
use crate::domain::bulk::{BulkAction, BulkOutcome, BulkRequest};
use crate::domain::export::{Export, ExportFormat, ExportRow};
use crate::domain::role::Scope;
use crate::domain::status::{IntegrationStatus, StatusFlow, SyncStatus};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{notifications, simulation};

use super::{ensure_bulk_scope, ensure_can_mutate, resolve_owner, to_json};

const RESOURCE: &str = "bank integration";

#[derive(Debug, Deserialize, Serialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub sync_status: Option<String>,
    pub owner_id: Option<Uuid>,
    pub is_primary: Option<bool>,
}

/// GET /api/bank-integrations
pub async fn list(
    Query(params): Query<ListQuery>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let scope = Scope::owner_only(auth_user.id, auth_user.role);
    let cache_key = cache::list_key(bank_integration::TABLE, auth_user.id, auth_user.role, &params);
    let response_cache = ResponseCache::instance();

    if let Some(hit) = response_cache.get(&cache_key).await {
        if let Ok(pagination) = serde_json::from_value::<Pagination>(hit["pagination"].clone()) {
            return Ok(ApiResponse::paginated(hit["data"].clone(), pagination));
        }
    }

    let status_filter = params
        .status
        .as_deref()
        .map(|s| s.parse::<IntegrationStatus>())
        .transpose()?;
    let sync_filter = params
        .sync_status
        .as_deref()
        .map(|s| s.parse::<SyncStatus>())
        .transpose()?;
    let owner_filter = if scope.is_unrestricted() {
        params.owner_id
    } else {
        None
    };
    let page = clamp_page(params.page);
    let limit = clamp_limit(params.limit);

    let builder = SelectBuilder::new(bank_integration::TABLE)
        .scope(scope, None)
        .eq_opt(
            "status",
            status_filter.map(|s| Param::Str(s.as_str().to_string())),
        )
        .eq_opt(
            "sync_status",
            sync_filter.map(|s| Param::Str(s.as_str().to_string())),
        )
        .eq_opt("owner_id", owner_filter.map(Param::Uuid))
        .eq_opt("is_primary", params.is_primary.map(Param::Bool))
        .search(bank_integration::SEARCH_COLUMNS, params.search.as_deref())
        .paginate(page, limit);

    let pool = DatabaseManager::pool().await?;
    let items: Vec<BankIntegration> = builder.fetch(&pool).await?;
    let total = builder.count(&pool).await?;
    let pagination = Pagination::new(page, limit, total);

    let data = to_json(&items)?;
    response_cache
        .put(cache_key, json!({ "data": data, "pagination": pagination }))
        .await;

    Ok(ApiResponse::paginated(data, pagination))
}

#[derive(Debug, Deserialize)]
pub struct CreateBankIntegration {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub owner_id: Option<Uuid>,
}

/// POST /api/bank-integrations
pub async fn create(
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateBankIntegration>,
) -> ApiResult<BankIntegration> {
    let mut missing = vec![];
    if payload
        .bank_name
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("bank_name");
    }
    if payload
        .account_number
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("account_number");
    }
    if payload
        .account_name
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("account_name");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let account_number = payload.account_number.unwrap().trim().to_string();
    if !account_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::validation(
            "Account number must contain only digits",
            None,
        ));
    }

    let owner_id = resolve_owner(&auth_user, payload.owner_id)?;
    let pool = DatabaseManager::pool().await?;

    let now = Utc::now();
    let record = BankIntegration {
        id: Uuid::new_v4(),
        owner_id,
        bank_name: payload.bank_name.unwrap().trim().to_string(),
        account_number,
        account_name: payload.account_name.unwrap().trim().to_string(),
        is_primary: false,
        status: IntegrationStatus::Pending.as_str().to_string(),
        sync_status: SyncStatus::Idle.as_str().to_string(),
        last_synced_at: None,
        created_at: now,
        updated_at: now,
    };

    bank_integration::insert(&pool, &record).await?;
    ResponseCache::instance()
        .invalidate_prefix(bank_integration::TABLE)
        .await;

    Ok(ApiResponse::created(record))
}

/// GET /api/bank-integrations/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<BankIntegration> {
    let pool = DatabaseManager::pool().await?;
    let record: BankIntegration = query::find_by_id(&pool, bank_integration::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Bank integration not found"))?;

    let scope = Scope::owner_only(auth_user.id, auth_user.role);
    if !scope.permits(record.owner_id, None) {
        return Err(ApiError::not_found("Bank integration not found"));
    }

    Ok(ApiResponse::success(record))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBankIntegration {
    pub bank_name: Option<String>,
    pub account_name: Option<String>,
    pub status: Option<String>,
}

/// PATCH /api/bank-integrations/:id
pub async fn update(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateBankIntegration>,
) -> ApiResult<BankIntegration> {
    let pool = DatabaseManager::pool().await?;
    let existing: BankIntegration = query::find_by_id(&pool, bank_integration::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Bank integration not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, None)?;

    let mut builder = UpdateBuilder::new()
        .set_opt("bank_name", payload.bank_name.map(Param::Str))
        .set_opt("account_name", payload.account_name.map(Param::Str));

    let mut status_change: Option<IntegrationStatus> = None;
    if let Some(next) = payload.status.as_deref() {
        let next: IntegrationStatus = next.parse()?;
        let current: IntegrationStatus = existing.status.parse()?;
        if next != current {
            current.transition(next)?;
            status_change = Some(next);
            builder = builder.set("status", Param::Str(next.as_str().to_string()));
        }
    }

    if builder.is_empty() {
        return Ok(ApiResponse::success(existing));
    }

    let updated: BankIntegration = builder
        .execute_returning(&pool, bank_integration::TABLE, id)
        .await?;
    ResponseCache::instance()
        .invalidate_prefix(bank_integration::TABLE)
        .await;

    if let Some(next) = status_change {
        notifications::status_changed(&pool, updated.owner_id, RESOURCE, next.as_str()).await;
    }

    Ok(ApiResponse::success(updated))
}

/// DELETE /api/bank-integrations/:id - Hard delete
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let existing: BankIntegration = query::find_by_id(&pool, bank_integration::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Bank integration not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, None)?;

    query::execute(
        &pool,
        "DELETE FROM bank_integrations WHERE id = $1",
        vec![Param::Uuid(id)],
    )
    .await?;
    ResponseCache::instance()
        .invalidate_prefix(bank_integration::TABLE)
        .await;

    Ok(ApiResponse::success(json!({ "deleted": id })))
}

/// POST /api/bank-integrations/bulk -
/// delete | activate | deactivate | set_primary | sync | export
///
/// `deactivate` allows partial authorization: a taxpayer's batch silently
/// affects only their own integrations. Every other action rejects the whole
/// batch if any id is out of scope.
pub async fn bulk(
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<Value> {
    let action = request.action()?;
    let ids = request.require_ids()?.to_vec();
    let pool = DatabaseManager::pool().await?;
    let scope = Scope::owner_only(auth_user.id, auth_user.role);

    let records: Vec<BankIntegration> =
        query::fetch_by_ids(&pool, bank_integration::TABLE, &ids).await?;

    let partial_auth = matches!(action, BulkAction::Deactivate);
    if !partial_auth {
        let ownerships: Vec<(Uuid, Option<Uuid>)> =
            records.iter().map(|b| (b.owner_id, None)).collect();
        ensure_bulk_scope(scope, &ids, &ownerships)?;
    }

    let outcome = match action {
        BulkAction::Delete => {
            let affected = query::execute(
                &pool,
                "DELETE FROM bank_integrations WHERE id = ANY($1)",
                vec![Param::UuidArray(ids.clone())],
            )
            .await?;
            BulkOutcome::new(action, affected)
        }
        BulkAction::Activate => {
            let affected = query::execute(
                &pool,
                "UPDATE bank_integrations SET status = 'active', updated_at = NOW()
                 WHERE id = ANY($1) AND status IN ('pending', 'inactive')",
                vec![Param::UuidArray(ids.clone())],
            )
            .await?;
            BulkOutcome::new(action, affected)
        }
        BulkAction::Deactivate => {
            let (sql, params) = if scope.is_unrestricted() {
                (
                    "UPDATE bank_integrations SET status = 'inactive', updated_at = NOW()
                     WHERE id = ANY($1) AND status IN ('active', 'pending')",
                    vec![Param::UuidArray(ids.clone())],
                )
            } else {
                (
                    "UPDATE bank_integrations SET status = 'inactive', updated_at = NOW()
                     WHERE id = ANY($1) AND owner_id = $2 AND status IN ('active', 'pending')",
                    vec![Param::UuidArray(ids.clone()), Param::Uuid(auth_user.id)],
                )
            };
            let affected = query::execute(&pool, sql, params).await?;
            BulkOutcome::new(action, affected)
        }
        BulkAction::SetPrimary => {
            if ids.len() != 1 {
                return Err(ApiError::validation(
                    "set_primary targets exactly one integration",
                    None,
                ));
            }
            let target = records
                .first()
                .ok_or_else(|| ApiError::not_found("Bank integration not found"))?;
            let current: IntegrationStatus = target.status.parse()?;
            if current != IntegrationStatus::Active {
                return Err(ApiError::conflict(
                    "Only an active integration can be made primary",
                ));
            }
            // One primary per owner: the target wins, siblings are cleared
            let affected = query::execute(
                &pool,
                "UPDATE bank_integrations SET is_primary = (id = $1), updated_at = NOW()
                 WHERE owner_id = $2",
                vec![Param::Uuid(target.id), Param::Uuid(target.owner_id)],
            )
            .await?;
            BulkOutcome::new(action, affected)
        }
        BulkAction::Sync => {
            let eligible: Vec<&BankIntegration> = records
                .iter()
                .filter(|b| {
                    b.status == IntegrationStatus::Active.as_str()
                        && b.sync_status != SyncStatus::Syncing.as_str()
                })
                .collect();
            let eligible_ids: Vec<Uuid> = eligible.iter().map(|b| b.id).collect();
            let affected = if eligible_ids.is_empty() {
                0
            } else {
                query::execute(
                    &pool,
                    "UPDATE bank_integrations SET sync_status = 'syncing', updated_at = NOW()
                     WHERE id = ANY($1)",
                    vec![Param::UuidArray(eligible_ids)],
                )
                .await?
            };
            for record in &eligible {
                simulation::schedule_bank_sync(record.id, record.owner_id);
            }
            BulkOutcome::new(action, affected)
        }
        BulkAction::Export => {
            let format = ExportFormat::parse(request.format.as_deref())?;
            let export = Export::build("bank-integrations", format, export_rows(&records));
            return Ok(ApiResponse::success(to_json(export)?));
        }
        other => {
            return Err(ApiError::invalid_action(format!(
                "Action '{}' is not supported for bank integrations",
                other
            )))
        }
    };

    ResponseCache::instance()
        .invalidate_prefix(bank_integration::TABLE)
        .await;

    Ok(ApiResponse::success(to_json(outcome)?))
}

fn export_rows(records: &[BankIntegration]) -> Vec<ExportRow> {
    let mut rows = vec![];
    for record in records {
        rows.push(ExportRow::new("Integration ID", record.id.to_string()));
        rows.push(ExportRow::new("Bank Name", record.bank_name.clone()));
        rows.push(ExportRow::new(
            "Account Number",
            mask_account_number(&record.account_number),
        ));
        rows.push(ExportRow::new("Account Name", record.account_name.clone()));
        rows.push(ExportRow::new("Status", record.status.clone()));
        rows.push(ExportRow::new(
            "Primary",
            if record.is_primary { "yes" } else { "no" },
        ));
        rows.push(ExportRow::new(
            "Last Synced",
            record
                .last_synced_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        ));
    }
    rows
}

/// Exports never carry the full account number
fn mask_account_number(number: &str) -> String {
    if number.len() <= 4 {
        return "****".to_string();
    }
    format!("****{}", &number[number.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_numbers_are_masked_in_exports() {
        assert_eq!(mask_account_number("1234567890"), "****7890");
        assert_eq!(mask_account_number("123"), "****");
    }
}
