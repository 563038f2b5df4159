//! Job posting repository implementation.

use sqlx::PgPool;

use medboard_core::error::{AppError, ErrorKind};
use medboard_core::result::AppResult;
use medboard_entity::job::{CreateJobPosting, JobPosting};

use crate::soft_delete::{self, Condition, SqlValue, WhereClause};

const TABLE: &str = "job_postings";

/// Repository for job postings. All reads hide soft-deleted rows unless
/// the method name says otherwise.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job posting repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an active posting by ID.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<JobPosting>> {
        let mut qb = soft_delete::select_active(TABLE, None);
        WhereClause::continuing(&mut qb).eq(None, Condition::eq("id", id));

        qb.build_query_as::<JobPosting>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job posting", e))
    }

    /// Find a posting by ID whether or not it has been deleted.
    pub async fn find_by_id_including_deleted(&self, id: i64) -> AppResult<Option<JobPosting>> {
        sqlx::query_as::<_, JobPosting>("SELECT * FROM job_postings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job posting", e))
    }

    /// List a hospital's active postings, newest first.
    pub async fn find_by_hospital(&self, hospital_id: i64) -> AppResult<Vec<JobPosting>> {
        let mut qb = soft_delete::select_active(TABLE, Some("j"));
        WhereClause::continuing(&mut qb).eq(Some("j"), Condition::eq("hospital_id", hospital_id));
        qb.push(" ORDER BY j.created_at DESC, j.id DESC");

        qb.build_query_as::<JobPosting>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to list job postings", e)
            })
    }

    /// Create a posting.
    pub async fn create(&self, data: &CreateJobPosting) -> AppResult<JobPosting> {
        sqlx::query_as::<_, JobPosting>(
            "INSERT INTO job_postings (hospital_id, title, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(data.hospital_id)
        .bind(&data.title)
        .bind(&data.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job posting", e))
    }

    /// Soft-delete one of a hospital's postings.
    ///
    /// Returns `false` when the posting does not exist, belongs to another
    /// hospital, or is already deleted.
    pub async fn delete(&self, hospital_id: i64, id: i64) -> AppResult<bool> {
        let mut tx = self.begin().await?;
        let affected = soft_delete::soft_delete(
            &mut tx,
            TABLE,
            &[Condition::eq("id", id), Condition::eq("hospital_id", hospital_id)],
        )
        .await?;
        Self::commit(tx).await?;
        Ok(affected == 1)
    }

    /// Soft-delete several of a hospital's postings at once.
    pub async fn delete_many(&self, hospital_id: i64, ids: &[i64]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<SqlValue> = ids.iter().copied().map(SqlValue::from).collect();
        let mut tx = self.begin().await?;
        let affected = soft_delete::soft_delete_many(
            &mut tx,
            TABLE,
            &ids,
            &[Condition::eq("hospital_id", hospital_id)],
        )
        .await?;
        Self::commit(tx).await?;
        Ok(affected)
    }

    async fn begin(&self) -> AppResult<sqlx::Transaction<'static, sqlx::Postgres>> {
        self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })
    }

    async fn commit(tx: sqlx::Transaction<'static, sqlx::Postgres>) -> AppResult<()> {
        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })
    }
}
