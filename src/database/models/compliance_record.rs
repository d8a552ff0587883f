use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "compliance_records";
pub const SEARCH_COLUMNS: &[&str] = &["requirement", "period", "notes"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ComplianceRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub assigned_to: Option<Uuid>,
    /// e.g. "SPT Tahunan filing", "PPN monthly remittance"
    pub requirement: String,
    pub period: String,
    pub due_date: Option<DateTime<Utc>>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn insert(pool: &PgPool, record: &ComplianceRecord) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO compliance_records (id, owner_id, assigned_to, requirement,
         period, due_date, status, notes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(record.id)
    .bind(record.owner_id)
    .bind(record.assigned_to)
    .bind(&record.requirement)
    .bind(&record.period)
    .bind(record.due_date)
    .bind(&record.status)
    .bind(&record.notes)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}
