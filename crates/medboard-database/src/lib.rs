//! # medboard-database
//!
//! PostgreSQL connection management, the soft-delete visibility and
//! deletion helpers, and concrete repositories.

pub mod connection;
pub mod migration;
pub mod repositories;
pub mod soft_delete;

pub use connection::DatabasePool;
