//! # medboard-entity
//!
//! Row models for the tables touched by the soft-delete and token cleanup
//! paths.

pub mod job;
pub mod token;

pub use job::JobPosting;
pub use token::RefreshToken;
