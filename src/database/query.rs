//! Parameterized query construction for list, lookup, and sparse-update
//! operations.
//!
//! All SQL is generated with positional binds; column and table names are
//! compile-time literals supplied by the models, never request input. The
//! caller's visibility scope is injected as a WHERE condition so that a
//! non-privileged list query physically cannot return foreign rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::domain::role::Scope;

/// A typed bind parameter.
#[derive(Debug, Clone)]
pub enum Param {
    Str(String),
    Int(i64),
    Bool(bool),
    Uuid(Uuid),
    UuidArray(Vec<Uuid>),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Eq(&'static str, Param),
    NotEq(&'static str, Param),
    Gte(&'static str, Param),
    Lte(&'static str, Param),
    /// `(a ILIKE $n OR b ILIKE $n+1 ...)` free-text search
    Search(Vec<&'static str>, String),
    /// `("owner_id" = $n OR "<assignee>" = $n+1)` consultant scope
    OwnerOrAssignee(&'static str, Uuid),
}

/// Builder for filtered, scoped, paginated SELECTs over one table.
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: &'static str,
    predicates: Vec<Predicate>,
    order_by: (&'static str, SortDirection),
    page: i64,
    limit: i64,
}

impl SelectBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            predicates: vec![],
            order_by: ("created_at", SortDirection::Desc),
            page: 1,
            limit: crate::config::config().api.default_page_size,
        }
    }

    /// Force the caller's visibility scope into the query.
    ///
    /// `assignee_column` names the staff-assignee column for resources that
    /// have one; `None` collapses consultant scope to owner-only.
    pub fn scope(mut self, scope: Scope, assignee_column: Option<&'static str>) -> Self {
        match (scope, assignee_column) {
            (Scope::All, _) => {}
            (Scope::Owned(id), _) => {
                self.predicates.push(Predicate::Eq("owner_id", Param::Uuid(id)));
            }
            (Scope::OwnedOrAssigned(id), Some(col)) => {
                self.predicates.push(Predicate::OwnerOrAssignee(col, id));
            }
            (Scope::OwnedOrAssigned(id), None) => {
                self.predicates.push(Predicate::Eq("owner_id", Param::Uuid(id)));
            }
        }
        self
    }

    pub fn eq(mut self, column: &'static str, value: Param) -> Self {
        self.predicates.push(Predicate::Eq(column, value));
        self
    }

    pub fn eq_opt(self, column: &'static str, value: Option<Param>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    pub fn not_eq(mut self, column: &'static str, value: Param) -> Self {
        self.predicates.push(Predicate::NotEq(column, value));
        self
    }

    pub fn date_range(
        mut self,
        column: &'static str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        if let Some(from) = from {
            self.predicates.push(Predicate::Gte(column, Param::Timestamp(from)));
        }
        if let Some(to) = to {
            self.predicates.push(Predicate::Lte(column, Param::Timestamp(to)));
        }
        self
    }

    /// ILIKE search across the given text columns
    pub fn search(mut self, columns: &[&'static str], term: Option<&str>) -> Self {
        if let Some(term) = term {
            let trimmed = term.trim();
            if !trimmed.is_empty() {
                self.predicates
                    .push(Predicate::Search(columns.to_vec(), format!("%{}%", trimmed)));
            }
        }
        self
    }

    pub fn order(mut self, column: &'static str, direction: SortDirection) -> Self {
        self.order_by = (column, direction);
        self
    }

    pub fn paginate(mut self, page: i64, limit: i64) -> Self {
        self.page = page.max(1);
        self.limit = limit;
        self
    }

    fn where_clause(&self, params: &mut Vec<Param>) -> String {
        let mut parts = vec![];
        for predicate in &self.predicates {
            match predicate {
                Predicate::Eq(col, value) => {
                    params.push(value.clone());
                    parts.push(format!("\"{}\" = ${}", col, params.len()));
                }
                Predicate::NotEq(col, value) => {
                    params.push(value.clone());
                    parts.push(format!("\"{}\" <> ${}", col, params.len()));
                }
                Predicate::Gte(col, value) => {
                    params.push(value.clone());
                    parts.push(format!("\"{}\" >= ${}", col, params.len()));
                }
                Predicate::Lte(col, value) => {
                    params.push(value.clone());
                    parts.push(format!("\"{}\" <= ${}", col, params.len()));
                }
                Predicate::Search(cols, pattern) => {
                    let alternatives: Vec<String> = cols
                        .iter()
                        .map(|col| {
                            params.push(Param::Str(pattern.clone()));
                            format!("\"{}\" ILIKE ${}", col, params.len())
                        })
                        .collect();
                    parts.push(format!("({})", alternatives.join(" OR ")));
                }
                Predicate::OwnerOrAssignee(assignee_col, id) => {
                    params.push(Param::Uuid(*id));
                    let owner_idx = params.len();
                    params.push(Param::Uuid(*id));
                    parts.push(format!(
                        "(\"owner_id\" = ${} OR \"{}\" = ${})",
                        owner_idx,
                        assignee_col,
                        params.len()
                    ));
                }
            }
        }
        parts.join(" AND ")
    }

    pub fn to_sql(&self) -> SqlResult {
        let mut params = vec![];
        let where_clause = self.where_clause(&mut params);
        let offset = (self.page - 1) * self.limit;

        let query = [
            format!("SELECT * FROM \"{}\"", self.table),
            if where_clause.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", where_clause)
            },
            format!(
                "ORDER BY \"{}\" {}",
                self.order_by.0,
                self.order_by.1.to_sql()
            ),
            format!("LIMIT {} OFFSET {}", self.limit, offset),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        let mut params = vec![];
        let where_clause = self.where_clause(&mut params);
        let query = if where_clause.is_empty() {
            format!("SELECT COUNT(*) FROM \"{}\"", self.table)
        } else {
            format!("SELECT COUNT(*) FROM \"{}\" WHERE {}", self.table, where_clause)
        };
        SqlResult { query, params }
    }

    pub async fn fetch<T>(&self, pool: &PgPool) -> Result<Vec<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = self.to_sql();
        fetch_many(pool, &sql.query, sql.params).await
    }

    pub async fn count(&self, pool: &PgPool) -> Result<i64, DatabaseError> {
        let sql = self.to_count_sql();
        let mut q = sqlx::query_scalar::<_, i64>(&sql.query);
        for p in sql.params {
            q = bind_scalar(q, p);
        }
        Ok(q.fetch_one(pool).await?)
    }
}

/// Builder for sparse-patch UPDATEs: only explicitly set columns appear in
/// the statement; `updated_at` is always touched.
#[derive(Debug, Default)]
pub struct UpdateBuilder {
    sets: Vec<(&'static str, Param)>,
}

impl UpdateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &'static str, value: Param) -> Self {
        self.sets.push((column, value));
        self
    }

    pub fn set_opt(self, column: &'static str, value: Option<Param>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Apply to one row and return it. Errors with `RowNotFound` (mapped to
    /// 404 upstream) if the id is gone.
    pub async fn execute_returning<T>(
        self,
        pool: &PgPool,
        table: &'static str,
        id: Uuid,
    ) -> Result<T, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut params = vec![];
        let assignments: Vec<String> = self
            .sets
            .into_iter()
            .map(|(col, value)| {
                params.push(value);
                format!("\"{}\" = ${}", col, params.len())
            })
            .collect();

        params.push(Param::Uuid(id));
        let query = format!(
            "UPDATE \"{}\" SET {}, \"updated_at\" = NOW() WHERE \"id\" = ${} RETURNING *",
            table,
            assignments.join(", "),
            params.len()
        );

        let mut q = sqlx::query_as::<_, T>(&query);
        for p in params {
            q = bind_query_as(q, p);
        }
        Ok(q.fetch_one(pool).await?)
    }
}

/// Fetch all rows matching the given ids, unpaginated.
pub async fn fetch_by_ids<T>(
    pool: &PgPool,
    table: &'static str,
    ids: &[Uuid],
) -> Result<Vec<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let query = format!("SELECT * FROM \"{}\" WHERE \"id\" = ANY($1)", table);
    let rows = sqlx::query_as::<_, T>(&query)
        .bind(ids.to_vec())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetch a single row by id.
pub async fn find_by_id<T>(
    pool: &PgPool,
    table: &'static str,
    id: Uuid,
) -> Result<Option<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let query = format!("SELECT * FROM \"{}\" WHERE \"id\" = $1", table);
    let row = sqlx::query_as::<_, T>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Run a parameterized statement, returning the affected-row count.
pub async fn execute(
    pool: &PgPool,
    query: &str,
    params: Vec<Param>,
) -> Result<u64, DatabaseError> {
    let mut q = sqlx::query(query);
    for p in params {
        q = bind_query(q, p);
    }
    Ok(q.execute(pool).await?.rows_affected())
}

/// Run a parameterized query, collecting typed rows.
pub async fn fetch_many<T>(
    pool: &PgPool,
    query: &str,
    params: Vec<Param>,
) -> Result<Vec<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut q = sqlx::query_as::<_, T>(query);
    for p in params {
        q = bind_query_as(q, p);
    }
    Ok(q.fetch_all(pool).await?)
}

fn bind_query(
    q: sqlx::query::Query<'_, sqlx::Postgres, PgArguments>,
    p: Param,
) -> sqlx::query::Query<'_, sqlx::Postgres, PgArguments> {
    match p {
        Param::Str(v) => q.bind(v),
        Param::Int(v) => q.bind(v),
        Param::Bool(v) => q.bind(v),
        Param::Uuid(v) => q.bind(v),
        Param::UuidArray(v) => q.bind(v),
        Param::Timestamp(v) => q.bind(v),
        Param::Decimal(v) => q.bind(v),
    }
}

fn bind_query_as<T>(
    q: sqlx::query::QueryAs<'_, sqlx::Postgres, T, PgArguments>,
    p: Param,
) -> sqlx::query::QueryAs<'_, sqlx::Postgres, T, PgArguments> {
    match p {
        Param::Str(v) => q.bind(v),
        Param::Int(v) => q.bind(v),
        Param::Bool(v) => q.bind(v),
        Param::Uuid(v) => q.bind(v),
        Param::UuidArray(v) => q.bind(v),
        Param::Timestamp(v) => q.bind(v),
        Param::Decimal(v) => q.bind(v),
    }
}

fn bind_scalar<T>(
    q: sqlx::query::QueryScalar<'_, sqlx::Postgres, T, PgArguments>,
    p: Param,
) -> sqlx::query::QueryScalar<'_, sqlx::Postgres, T, PgArguments> {
    match p {
        Param::Str(v) => q.bind(v),
        Param::Int(v) => q.bind(v),
        Param::Bool(v) => q.bind(v),
        Param::Uuid(v) => q.bind(v),
        Param::UuidArray(v) => q.bind(v),
        Param::Timestamp(v) => q.bind(v),
        Param::Decimal(v) => q.bind(v),
    }
}

/// Pagination envelope attached to every list response.
#[derive(Debug, Clone, Copy, Serialize, serde::Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// Clamp a requested page number to >= 1
pub fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

/// Clamp a requested page size to 1..=configured max, defaulting from config
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    let api = &crate::config::config().api;
    limit
        .unwrap_or(api.default_page_size)
        .clamp(1, api.max_page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::role::{Scope, UserRole};

    #[test]
    fn owner_scope_is_always_in_the_where_clause() {
        let me = Uuid::new_v4();
        let scope = Scope::for_user(me, UserRole::WajibPajak);
        let sql = SelectBuilder::new("audits")
            .scope(scope, Some("assigned_to"))
            .to_sql();
        assert!(sql.query.contains("\"owner_id\" = $1"), "sql: {}", sql.query);
        assert!(matches!(sql.params[0], Param::Uuid(id) if id == me));
    }

    #[test]
    fn consultant_scope_covers_owner_and_assignee() {
        let me = Uuid::new_v4();
        let scope = Scope::for_user(me, UserRole::Consultant);
        let sql = SelectBuilder::new("audits")
            .scope(scope, Some("assigned_to"))
            .to_sql();
        assert!(
            sql.query.contains("(\"owner_id\" = $1 OR \"assigned_to\" = $2)"),
            "sql: {}",
            sql.query
        );
    }

    #[test]
    fn privileged_scope_adds_no_owner_condition() {
        let scope = Scope::for_user(Uuid::new_v4(), UserRole::Admin);
        let sql = SelectBuilder::new("audits")
            .scope(scope, Some("assigned_to"))
            .to_sql();
        assert!(!sql.query.contains("owner_id"), "sql: {}", sql.query);
    }

    #[test]
    fn pagination_translates_to_limit_offset() {
        let sql = SelectBuilder::new("documents").paginate(3, 25).to_sql();
        assert!(sql.query.ends_with("LIMIT 25 OFFSET 50"), "sql: {}", sql.query);
    }

    #[test]
    fn search_expands_to_ilike_alternatives() {
        let sql = SelectBuilder::new("documents")
            .search(&["title", "notes"], Some("spt"))
            .to_sql();
        assert!(
            sql.query.contains("(\"title\" ILIKE $1 OR \"notes\" ILIKE $2)"),
            "sql: {}",
            sql.query
        );
        assert!(matches!(&sql.params[0], Param::Str(s) if s == "%spt%"));
    }

    #[test]
    fn blank_search_is_ignored() {
        let sql = SelectBuilder::new("documents")
            .search(&["title"], Some("   "))
            .to_sql();
        assert!(!sql.query.contains("ILIKE"));
    }

    #[test]
    fn count_sql_drops_order_and_pagination() {
        let sql = SelectBuilder::new("audits")
            .eq("status", Param::Str("planned".into()))
            .paginate(2, 10)
            .to_count_sql();
        assert_eq!(
            sql.query,
            "SELECT COUNT(*) FROM \"audits\" WHERE \"status\" = $1"
        );
    }

    #[test]
    fn pagination_math() {
        let p = Pagination::new(1, 20, 41);
        assert_eq!(p.pages, 3);
        let empty = Pagination::new(1, 20, 0);
        assert_eq!(empty.pages, 0);
    }

    #[test]
    fn limit_is_clamped_to_configured_max() {
        assert_eq!(clamp_limit(Some(10_000)), crate::config::config().api.max_page_size);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_page(Some(-4)), 1);
    }
}
