//! Soft-delete visibility filter and logical deletion.
//!
//! Soft-deletable tables carry a nullable `deleted_at` column. Reads go
//! through [`exclude_deleted`] (or [`select_active`]) so deleted rows stay
//! invisible, and deletes go through [`soft_delete`] / [`soft_delete_many`],
//! which set the marker with a single conditional `UPDATE`:
//!
//! ```sql
//! UPDATE "job_postings" SET "deleted_at" = NOW()
//! WHERE "deleted_at" IS NULL AND "id" IN ($1, $2) AND "hospital_id" = $3
//! ```
//!
//! Checking visibility and writing the marker in one statement keeps two
//! concurrent deletes of the same row from both reporting success.

use sqlx::{Postgres, QueryBuilder, Transaction};
use tracing::debug;
use uuid::Uuid;

use medboard_core::error::{AppError, ErrorKind};
use medboard_core::result::AppResult;

/// Name of the soft-delete marker column.
pub const DELETED_AT: &str = "deleted_at";

/// Primary-key column used by batch deletes.
pub const PRIMARY_KEY: &str = "id";

/// A typed value bound into a generated statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// 64-bit integer.
    Int(i64),
    /// UUID.
    Uuid(Uuid),
    /// Text.
    Text(String),
    /// Boolean.
    Bool(bool),
}

impl SqlValue {
    fn push_bind(self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Int(v) => qb.push_bind(v),
            Self::Uuid(v) => qb.push_bind(v),
            Self::Text(v) => qb.push_bind(v),
            Self::Bool(v) => qb.push_bind(v),
        };
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// An equality predicate `column = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name (unqualified).
    pub column: String,
    /// Value the column must equal.
    pub value: SqlValue,
}

impl Condition {
    /// Build `column = value`.
    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Quote an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_ref(alias: Option<&str>, column: &str) -> String {
    match alias {
        Some(alias) => format!("{}.{}", quote_ident(alias), quote_ident(column)),
        None => quote_ident(column),
    }
}

/// Tracks whether a `WHERE` clause has been opened on a query so that
/// predicates can be appended without caring about their position.
pub struct WhereClause<'qb, 'args> {
    qb: &'qb mut QueryBuilder<'args, Postgres>,
    opened: bool,
}

impl<'qb, 'args> WhereClause<'qb, 'args> {
    /// Start a clause on a query that has no `WHERE` yet.
    pub fn new(qb: &'qb mut QueryBuilder<'args, Postgres>) -> Self {
        Self { qb, opened: false }
    }

    /// Continue a query whose SQL already ends inside a `WHERE` clause.
    pub fn continuing(qb: &'qb mut QueryBuilder<'args, Postgres>) -> Self {
        Self { qb, opened: true }
    }

    /// Open the next predicate slot (` WHERE ` or ` AND `) and hand back
    /// the builder to write it.
    pub fn predicate(&mut self) -> &mut QueryBuilder<'args, Postgres> {
        self.qb.push(if self.opened { " AND " } else { " WHERE " });
        self.opened = true;
        &mut *self.qb
    }

    /// Append `alias.column = $n`.
    pub fn eq(&mut self, alias: Option<&str>, condition: Condition) -> &mut Self {
        let column = column_ref(alias, &condition.column);
        let qb = self.predicate();
        qb.push(column).push(" = ");
        condition.value.push_bind(qb);
        self
    }
}

/// Restrict a query to rows whose deletion marker is null.
///
/// With an alias the marker is qualified (`"j"."deleted_at"`), otherwise the
/// bare column is used. A wrong alias is not detected here; the statement
/// fails when executed.
pub fn exclude_deleted<'c, 'qb, 'args>(
    clause: &'c mut WhereClause<'qb, 'args>,
    alias: Option<&str>,
) -> &'c mut WhereClause<'qb, 'args> {
    let column = column_ref(alias, DELETED_AT);
    clause.predicate().push(column).push(" IS NULL");
    clause
}

/// `SELECT * FROM table [AS alias] WHERE <not deleted>`.
///
/// Further predicates can be chained with [`WhereClause::continuing`].
pub fn select_active(table: &str, alias: Option<&str>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT * FROM ");
    qb.push(quote_ident(table));
    if let Some(alias) = alias {
        qb.push(" AS ").push(quote_ident(alias));
    }
    exclude_deleted(&mut WhereClause::new(&mut qb), alias);
    qb
}

fn mark_deleted(table: &str) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE ");
    qb.push(quote_ident(table))
        .push(" SET ")
        .push(quote_ident(DELETED_AT))
        .push(" = NOW()");
    qb
}

/// Build the single-entity soft delete statement.
///
/// At least one condition is required; an unconditional update would mark
/// every row of the table.
pub fn build_soft_delete(
    table: &str,
    conditions: &[Condition],
) -> AppResult<QueryBuilder<'static, Postgres>> {
    if conditions.is_empty() {
        return Err(AppError::validation(format!(
            "Soft delete on '{table}' requires at least one match condition"
        )));
    }

    let mut qb = mark_deleted(table);
    let mut clause = WhereClause::new(&mut qb);
    exclude_deleted(&mut clause, None);
    for condition in conditions {
        clause.eq(None, condition.clone());
    }
    Ok(qb)
}

/// Build the batch soft delete statement, or `None` when there is nothing
/// to delete.
pub fn build_batch_soft_delete(
    table: &str,
    ids: &[SqlValue],
    extra: &[Condition],
) -> Option<QueryBuilder<'static, Postgres>> {
    if ids.is_empty() {
        return None;
    }

    let mut qb = mark_deleted(table);
    let mut clause = WhereClause::new(&mut qb);
    exclude_deleted(&mut clause, None);

    let qb_ids = clause.predicate();
    qb_ids.push(quote_ident(PRIMARY_KEY)).push(" IN (");
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            qb_ids.push(", ");
        }
        id.clone().push_bind(qb_ids);
    }
    qb_ids.push(")");

    for condition in extra {
        clause.eq(None, condition.clone());
    }
    Some(qb)
}

/// Soft-delete the active rows of `table` matching every condition.
///
/// Runs inside the caller's transaction and returns the number of rows
/// marked. Rows that are already deleted are never touched, so repeating
/// the call returns `0`. Database errors are returned as-is (wrapped with
/// their source); commit or rollback is up to the caller.
pub async fn soft_delete(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    conditions: &[Condition],
) -> AppResult<u64> {
    let mut query = build_soft_delete(table, conditions)?;
    let result = query.build().execute(&mut **tx).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to soft delete from {table}"),
            e,
        )
    })?;

    debug!(
        table,
        affected = result.rows_affected(),
        "Soft-deleted rows"
    );
    Ok(result.rows_affected())
}

/// Soft-delete the active rows of `table` whose primary key is in `ids`
/// and which satisfy every `extra` condition (ownership scoping etc.).
///
/// An empty id list returns `0` without issuing a statement.
pub async fn soft_delete_many(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    ids: &[SqlValue],
    extra: &[Condition],
) -> AppResult<u64> {
    let Some(mut query) = build_batch_soft_delete(table, ids, extra) else {
        return Ok(0);
    };

    let result = query.build().execute(&mut **tx).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to batch soft delete from {table}"),
            e,
        )
    })?;

    debug!(
        table,
        requested = ids.len(),
        affected = result.rows_affected(),
        "Batch soft-deleted rows"
    );
    Ok(result.rows_affected())
}
