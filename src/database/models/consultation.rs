use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "consultations";
pub const SEARCH_COLUMNS: &[&str] = &["topic", "notes"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Consultation {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Staff assignee; named for the role it holds
    pub consultant_id: Option<Uuid>,
    pub topic: String,
    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn insert(pool: &PgPool, consultation: &Consultation) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO consultations (id, owner_id, consultant_id, topic, status,
         scheduled_at, notes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(consultation.id)
    .bind(consultation.owner_id)
    .bind(consultation.consultant_id)
    .bind(&consultation.topic)
    .bind(&consultation.status)
    .bind(consultation.scheduled_at)
    .bind(&consultation.notes)
    .bind(consultation.created_at)
    .bind(consultation.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}
