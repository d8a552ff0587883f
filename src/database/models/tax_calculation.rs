use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "tax_calculations";
pub const SEARCH_COLUMNS: &[&str] = &["tax_type", "period", "notes"];

/// A stored assessment. The derived columns (taxable_income through
/// final_tax_amount) are written by the pure assessment function and never
/// accepted from the client.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaxCalculation {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub tax_type: String,
    /// Filing period, e.g. "2025" or "2025-03"
    pub period: String,
    pub gross_income: Decimal,
    pub deductible_expenses: Decimal,
    pub deductions: Decimal,
    pub tax_credits: Decimal,
    pub prior_payments: Decimal,
    pub taxable_income: Decimal,
    pub tax_rate: Decimal,
    pub calculated_tax: Decimal,
    pub final_tax_amount: Decimal,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn insert(pool: &PgPool, calculation: &TaxCalculation) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO tax_calculations (id, owner_id, tax_type, period,
         gross_income, deductible_expenses, deductions, tax_credits,
         prior_payments, taxable_income, tax_rate, calculated_tax,
         final_tax_amount, status, notes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
         $15, $16, $17)",
    )
    .bind(calculation.id)
    .bind(calculation.owner_id)
    .bind(&calculation.tax_type)
    .bind(&calculation.period)
    .bind(calculation.gross_income)
    .bind(calculation.deductible_expenses)
    .bind(calculation.deductions)
    .bind(calculation.tax_credits)
    .bind(calculation.prior_payments)
    .bind(calculation.taxable_income)
    .bind(calculation.tax_rate)
    .bind(calculation.calculated_tax)
    .bind(calculation.final_tax_amount)
    .bind(&calculation.status)
    .bind(&calculation.notes)
    .bind(calculation.created_at)
    .bind(calculation.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}
