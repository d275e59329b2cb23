//! Database access for the SeqStack analysis plugins.
//!
//! The plugins share one PostgreSQL database with the dispatcher. This
//! crate owns the connection pool plus the models and repositories for
//! the three tables the plugins touch: `analyses` (read), `analysis_results`
//! (insert), and `conversations` (targeted jsonb updates).

pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database is reachable before consuming any jobs.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
