//! Job bodies run by the cleanup scheduler.

pub mod token_cleanup;

pub use token_cleanup::TokenCleanupJob;
