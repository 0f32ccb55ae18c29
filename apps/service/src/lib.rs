//! Uptime monitoring core: a concurrent HTTP polling scheduler with its
//! storage collaborator and configuration.

pub mod config;
pub mod database;
pub mod error;
pub mod monitoring;
pub mod pool;

pub use error::SchedulerError;
