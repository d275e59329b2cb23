//! Read-only repository for the `analyses` table.

use seqstack_core::types::EntityId;
use sqlx::PgPool;

use crate::models::Analysis;

/// Column list for `analyses` queries.
const COLUMNS: &str = "id, config, created_at";

/// Read access to analysis rows owned by the dispatcher.
pub struct AnalysisRepo;

impl AnalysisRepo {
    /// Find an analysis by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: EntityId,
    ) -> Result<Option<Analysis>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM analyses WHERE id = $1");
        sqlx::query_as::<_, Analysis>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
