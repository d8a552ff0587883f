//! Tax-calculation endpoints.
//!
//! Creation runs the pure assessment; the derived columns are never
//! accepted from the client. Inputs may be revised while the calculation
//! is a draft, which re-runs the assessment.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::{self, ResponseCache};
use crate::database::manager::DatabaseManager;
use crate::database::models::tax_calculation::{self, TaxCalculation};
use crate::database::query::{
    self, clamp_limit, clamp_page, Pagination, Param, SelectBuilder, UpdateBuilder,
};
use crate::domain::bulk::{BulkAction, BulkOutcome, BulkRequest};
use crate::domain::export::{Export, ExportFormat, ExportRow};
use crate::domain::role::Scope;
use crate::domain::status::{CalculationStatus, StatusFlow};
use crate::domain::tax::{assess, AssessmentInput, TaxType};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::notifications;

use super::{ensure_bulk_scope, ensure_can_mutate, resolve_owner, to_json};

const RESOURCE: &str = "tax calculation";

#[derive(Debug, Deserialize, Serialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub tax_type: Option<String>,
    pub period: Option<String>,
    pub owner_id: Option<Uuid>,
}

/// GET /api/tax-calculations
pub async fn list(
    Query(params): Query<ListQuery>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let scope = Scope::owner_only(auth_user.id, auth_user.role);
    let cache_key = cache::list_key(tax_calculation::TABLE, auth_user.id, auth_user.role, &params);
    let response_cache = ResponseCache::instance();

    if let Some(hit) = response_cache.get(&cache_key).await {
        if let Ok(pagination) = serde_json::from_value::<Pagination>(hit["pagination"].clone()) {
            return Ok(ApiResponse::paginated(hit["data"].clone(), pagination));
        }
    }

    let status_filter = params
        .status
        .as_deref()
        .map(|s| s.parse::<CalculationStatus>())
        .transpose()?;
    let type_filter = params
        .tax_type
        .as_deref()
        .map(|s| s.parse::<TaxType>())
        .transpose()
        .map_err(|e| ApiError::validation(e, None))?;
    let owner_filter = if scope.is_unrestricted() {
        params.owner_id
    } else {
        None
    };
    let page = clamp_page(params.page);
    let limit = clamp_limit(params.limit);

    let builder = SelectBuilder::new(tax_calculation::TABLE)
        .scope(scope, None)
        .eq_opt(
            "status",
            status_filter.map(|s| Param::Str(s.as_str().to_string())),
        )
        .eq_opt(
            "tax_type",
            type_filter.map(|t| Param::Str(t.as_str().to_string())),
        )
        .eq_opt("period", params.period.clone().map(Param::Str))
        .eq_opt("owner_id", owner_filter.map(Param::Uuid))
        .search(tax_calculation::SEARCH_COLUMNS, params.search.as_deref())
        .paginate(page, limit);

    let pool = DatabaseManager::pool().await?;
    let items: Vec<TaxCalculation> = builder.fetch(&pool).await?;
    let total = builder.count(&pool).await?;
    let pagination = Pagination::new(page, limit, total);

    let data = to_json(&items)?;
    response_cache
        .put(cache_key, json!({ "data": data, "pagination": pagination }))
        .await;

    Ok(ApiResponse::paginated(data, pagination))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaxCalculation {
    pub tax_type: Option<String>,
    pub period: Option<String>,
    pub gross_income: Option<Decimal>,
    #[serde(default)]
    pub deductible_expenses: Option<Decimal>,
    #[serde(default)]
    pub deductions: Option<Decimal>,
    #[serde(default)]
    pub tax_credits: Option<Decimal>,
    #[serde(default)]
    pub prior_payments: Option<Decimal>,
    pub owner_id: Option<Uuid>,
    pub notes: Option<String>,
}

fn validate_amounts(input: &AssessmentInput) -> Result<(), ApiError> {
    let amounts = [
        ("gross_income", input.gross_income),
        ("deductible_expenses", input.deductible_expenses),
        ("deductions", input.deductions),
        ("tax_credits", input.tax_credits),
        ("prior_payments", input.prior_payments),
    ];
    for (field, amount) in amounts {
        if amount < Decimal::ZERO {
            return Err(ApiError::validation(
                format!("'{}' must not be negative", field),
                None,
            ));
        }
    }
    Ok(())
}

/// POST /api/tax-calculations - Assess and store as draft
pub async fn create(
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CreateTaxCalculation>,
) -> ApiResult<TaxCalculation> {
    let mut missing = vec![];
    if payload
        .tax_type
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("tax_type");
    }
    if payload
        .period
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        missing.push("period");
    }
    if payload.gross_income.is_none() {
        missing.push("gross_income");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let tax_type: TaxType = payload
        .tax_type
        .as_deref()
        .unwrap()
        .parse()
        .map_err(|e: String| ApiError::validation(e, None))?;

    let input = AssessmentInput {
        gross_income: payload.gross_income.unwrap(),
        deductible_expenses: payload.deductible_expenses.unwrap_or_default(),
        deductions: payload.deductions.unwrap_or_default(),
        tax_credits: payload.tax_credits.unwrap_or_default(),
        prior_payments: payload.prior_payments.unwrap_or_default(),
    };
    validate_amounts(&input)?;

    let owner_id = resolve_owner(&auth_user, payload.owner_id)?;
    let assessment = assess(tax_type, &input);

    let pool = DatabaseManager::pool().await?;
    let now = Utc::now();
    let record = TaxCalculation {
        id: Uuid::new_v4(),
        owner_id,
        tax_type: tax_type.as_str().to_string(),
        period: payload.period.unwrap().trim().to_string(),
        gross_income: input.gross_income,
        deductible_expenses: input.deductible_expenses,
        deductions: input.deductions,
        tax_credits: input.tax_credits,
        prior_payments: input.prior_payments,
        taxable_income: assessment.taxable_income,
        tax_rate: assessment.tax_rate,
        calculated_tax: assessment.calculated_tax,
        final_tax_amount: assessment.final_tax_amount,
        status: CalculationStatus::Draft.as_str().to_string(),
        notes: payload.notes,
        created_at: now,
        updated_at: now,
    };

    tax_calculation::insert(&pool, &record).await?;
    ResponseCache::instance()
        .invalidate_prefix(tax_calculation::TABLE)
        .await;

    Ok(ApiResponse::created(record))
}

/// GET /api/tax-calculations/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<TaxCalculation> {
    let pool = DatabaseManager::pool().await?;
    let record: TaxCalculation = query::find_by_id(&pool, tax_calculation::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tax calculation not found"))?;

    let scope = Scope::owner_only(auth_user.id, auth_user.role);
    if !scope.permits(record.owner_id, None) {
        return Err(ApiError::not_found("Tax calculation not found"));
    }

    Ok(ApiResponse::success(record))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaxCalculation {
    pub gross_income: Option<Decimal>,
    pub deductible_expenses: Option<Decimal>,
    pub deductions: Option<Decimal>,
    pub tax_credits: Option<Decimal>,
    pub prior_payments: Option<Decimal>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

impl UpdateTaxCalculation {
    fn touches_inputs(&self) -> bool {
        self.gross_income.is_some()
            || self.deductible_expenses.is_some()
            || self.deductions.is_some()
            || self.tax_credits.is_some()
            || self.prior_payments.is_some()
    }
}

/// PATCH /api/tax-calculations/:id
pub async fn update(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateTaxCalculation>,
) -> ApiResult<TaxCalculation> {
    let pool = DatabaseManager::pool().await?;
    let existing: TaxCalculation = query::find_by_id(&pool, tax_calculation::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tax calculation not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, None)?;

    let current: CalculationStatus = existing.status.parse()?;
    if payload.touches_inputs() && current != CalculationStatus::Draft {
        return Err(ApiError::conflict(
            "Amounts are frozen once a calculation has been submitted",
        ));
    }

    let mut builder = UpdateBuilder::new().set_opt("notes", payload.notes.clone().map(Param::Str));

    if payload.touches_inputs() {
        let tax_type: TaxType = existing
            .tax_type
            .parse()
            .map_err(|_| ApiError::internal("Stored calculation has an unrecognized tax type"))?;
        let input = AssessmentInput {
            gross_income: payload.gross_income.unwrap_or(existing.gross_income),
            deductible_expenses: payload
                .deductible_expenses
                .unwrap_or(existing.deductible_expenses),
            deductions: payload.deductions.unwrap_or(existing.deductions),
            tax_credits: payload.tax_credits.unwrap_or(existing.tax_credits),
            prior_payments: payload.prior_payments.unwrap_or(existing.prior_payments),
        };
        validate_amounts(&input)?;
        let assessment = assess(tax_type, &input);

        builder = builder
            .set("gross_income", Param::Decimal(input.gross_income))
            .set(
                "deductible_expenses",
                Param::Decimal(input.deductible_expenses),
            )
            .set("deductions", Param::Decimal(input.deductions))
            .set("tax_credits", Param::Decimal(input.tax_credits))
            .set("prior_payments", Param::Decimal(input.prior_payments))
            .set("taxable_income", Param::Decimal(assessment.taxable_income))
            .set("tax_rate", Param::Decimal(assessment.tax_rate))
            .set("calculated_tax", Param::Decimal(assessment.calculated_tax))
            .set(
                "final_tax_amount",
                Param::Decimal(assessment.final_tax_amount),
            );
    }

    let mut status_change: Option<CalculationStatus> = None;
    if let Some(next) = payload.status.as_deref() {
        let next: CalculationStatus = next.parse()?;
        if next != current {
            current.transition(next)?;
            status_change = Some(next);
            builder = builder.set("status", Param::Str(next.as_str().to_string()));
        }
    }

    if builder.is_empty() {
        return Ok(ApiResponse::success(existing));
    }

    let updated: TaxCalculation = builder
        .execute_returning(&pool, tax_calculation::TABLE, id)
        .await?;
    ResponseCache::instance()
        .invalidate_prefix(tax_calculation::TABLE)
        .await;

    if let Some(next) = status_change {
        notifications::status_changed(&pool, updated.owner_id, RESOURCE, next.as_str()).await;
    }

    Ok(ApiResponse::success(updated))
}

/// DELETE /api/tax-calculations/:id - Drafts only
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let existing: TaxCalculation = query::find_by_id(&pool, tax_calculation::TABLE, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tax calculation not found"))?;

    ensure_can_mutate(&auth_user, existing.owner_id, None)?;

    let status: CalculationStatus = existing.status.parse()?;
    if status != CalculationStatus::Draft {
        return Err(ApiError::conflict(format!(
            "Only draft calculations can be deleted (status is '{}')",
            existing.status
        )));
    }

    query::execute(
        &pool,
        "DELETE FROM tax_calculations WHERE id = $1",
        vec![Param::Uuid(id)],
    )
    .await?;
    ResponseCache::instance()
        .invalidate_prefix(tax_calculation::TABLE)
        .await;

    Ok(ApiResponse::success(json!({ "deleted": id })))
}

/// POST /api/tax-calculations/bulk - delete | update_status | export
pub async fn bulk(
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<Value> {
    let action = request.action()?;
    let ids = request.require_ids()?.to_vec();
    let pool = DatabaseManager::pool().await?;
    let scope = Scope::owner_only(auth_user.id, auth_user.role);

    let records: Vec<TaxCalculation> =
        query::fetch_by_ids(&pool, tax_calculation::TABLE, &ids).await?;
    let ownerships: Vec<(Uuid, Option<Uuid>)> =
        records.iter().map(|c| (c.owner_id, None)).collect();
    ensure_bulk_scope(scope, &ids, &ownerships)?;

    let outcome = match action {
        BulkAction::Delete => {
            let affected = query::execute(
                &pool,
                "DELETE FROM tax_calculations WHERE id = ANY($1) AND status = 'draft'",
                vec![Param::UuidArray(ids.clone())],
            )
            .await?;
            BulkOutcome::new(action, affected)
        }
        BulkAction::UpdateStatus => {
            let target: CalculationStatus = request
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
                        .parse::<CalculationStatus>()
                        .map_or(false, |current| current.can_transition(target))
                })
                .map(|c| c.id)
                .collect();
            let affected = if applicable.is_empty() {
                0
            } else {
                query::execute(
                    &pool,
                    "UPDATE tax_calculations SET status = $1, updated_at = NOW()
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
        BulkAction::Export => {
            let format = ExportFormat::parse(request.format.as_deref())?;
            let export = Export::build("tax-calculations", format, export_rows(&records));
            return Ok(ApiResponse::success(to_json(export)?));
        }
        other => {
            return Err(ApiError::invalid_action(format!(
                "Action '{}' is not supported for tax calculations",
                other
            )))
        }
    };

    ResponseCache::instance()
        .invalidate_prefix(tax_calculation::TABLE)
        .await;

    Ok(ApiResponse::success(to_json(outcome)?))
}

fn export_rows(records: &[TaxCalculation]) -> Vec<ExportRow> {
    let mut rows = vec![];
    for record in records {
        rows.push(ExportRow::new("Calculation ID", record.id.to_string()));
        rows.push(ExportRow::new("Tax Type", record.tax_type.clone()));
        rows.push(ExportRow::new("Period", record.period.clone()));
        rows.push(ExportRow::new(
            "Gross Income",
            record.gross_income.to_string(),
        ));
        rows.push(ExportRow::new(
            "Taxable Income",
            record.taxable_income.to_string(),
        ));
        rows.push(ExportRow::new("Tax Rate", record.tax_rate.to_string()));
        rows.push(ExportRow::new(
            "Calculated Tax",
            record.calculated_tax.to_string(),
        ));
        rows.push(ExportRow::new(
            "Final Tax Amount",
            record.final_tax_amount.to_string(),
        ));
        rows.push(ExportRow::new("Status", record.status.clone()));
    }
    rows
}
