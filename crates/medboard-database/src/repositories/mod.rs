//! Repository implementations for MedBoard tables.

pub mod job;
pub mod refresh_token;

pub use job::JobRepository;
pub use refresh_token::RefreshTokenRepository;
