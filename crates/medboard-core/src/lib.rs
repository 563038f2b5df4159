//! # medboard-core
//!
//! Core crate for the MedBoard job-board backend. Contains configuration
//! schemas, the token store trait, and the unified error system.
//!
//! This crate has **no** internal dependencies on other MedBoard crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
