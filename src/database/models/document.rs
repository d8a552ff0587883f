use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

pub const TABLE: &str = "documents";
pub const SEARCH_COLUMNS: &[&str] = &["title", "category", "file_name", "notes"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    /// e.g. "spt", "invoice", "receipt", "correspondence"
    pub category: String,
    pub file_name: String,
    /// Soft delete lives here: status "deleted" hides the row
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn insert(pool: &PgPool, document: &Document) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO documents (id, owner_id, title, category, file_name,
         status, notes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(document.id)
    .bind(document.owner_id)
    .bind(&document.title)
    .bind(&document.category)
    .bind(&document.file_name)
    .bind(&document.status)
    .bind(&document.notes)
    .bind(document.created_at)
    .bind(document.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}
