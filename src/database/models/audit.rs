use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "audits";
pub const SEARCH_COLUMNS: &[&str] = &["audit_type", "findings", "notes"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Audit {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub assigned_to: Option<Uuid>,
    /// e.g. "field", "desk", "correspondence"
    pub audit_type: String,
    pub tax_year: i32,
    pub status: String,
    pub findings: Option<String>,
    pub notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn insert(pool: &PgPool, audit: &Audit) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO audits (id, owner_id, assigned_to, audit_type, tax_year,
         status, findings, notes, scheduled_at, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(audit.id)
    .bind(audit.owner_id)
    .bind(audit.assigned_to)
    .bind(&audit.audit_type)
    .bind(audit.tax_year)
    .bind(&audit.status)
    .bind(&audit.findings)
    .bind(&audit.notes)
    .bind(audit.scheduled_at)
    .bind(audit.created_at)
    .bind(audit.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}
