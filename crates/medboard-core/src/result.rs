//! Convenience result type alias for MedBoard.

use crate::error::AppError;

/// A specialized `Result` type for MedBoard operations.
pub type AppResult<T> = Result<T, AppError>;
