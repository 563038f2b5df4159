//! Job posting entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A vacancy published by a hospital.
///
/// Postings are soft-deleted: `deleted_at` is set instead of removing
/// the row, so applications that reference it stay intact.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPosting {
    /// Primary key.
    pub id: i64,
    /// Owning hospital.
    pub hospital_id: i64,
    /// Position title.
    pub title: String,
    /// Free-form description.
    pub description: Option<String>,
    /// When the posting was created.
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker. `None` while the posting is visible.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Data for inserting a posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobPosting {
    /// Owning hospital.
    pub hospital_id: i64,
    /// Position title.
    pub title: String,
    /// Free-form description.
    pub description: Option<String>,
}
