//! Storage collaborator
//!
//! Targets and probe history live in a local LibSQL (SQLite) database. The
//! scheduler only sees the [`Database`] trait, so any backend can stand in.

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
