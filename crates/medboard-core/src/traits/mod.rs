//! Core traits defined in `medboard-core` and implemented by other crates.

pub mod token_store;

pub use token_store::{TokenStats, TokenStore};
