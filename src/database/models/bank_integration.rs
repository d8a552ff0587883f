use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "bank_integrations";
pub const SEARCH_COLUMNS: &[&str] = &["bank_name", "account_name", "account_number"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankIntegration {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub is_primary: bool,
    pub status: String,
    /// Lifecycle of the simulated statement sync, separate from `status`
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn insert(pool: &PgPool, integration: &BankIntegration) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO bank_integrations (id, owner_id, bank_name, account_number,
         account_name, is_primary, status, sync_status, last_synced_at,
         created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(integration.id)
    .bind(integration.owner_id)
    .bind(&integration.bank_name)
    .bind(&integration.account_number)
    .bind(&integration.account_name)
    .bind(integration.is_primary)
    .bind(&integration.status)
    .bind(&integration.sync_status)
    .bind(integration.last_synced_at)
    .bind(integration.created_at)
    .bind(integration.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}
