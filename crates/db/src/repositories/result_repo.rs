//! Repository for the `analysis_results` table.

use seqstack_core::types::EntityId;
use sqlx::PgPool;

use crate::models::AnalysisResult;

/// Column list for `analysis_results` queries.
const COLUMNS: &str = "id, result, analysis_id, plugin, created_at";

/// Insert access for result envelopes.
pub struct ResultRepo;

impl ResultRepo {
    /// Persist the result envelope for one handled job.
    ///
    /// Returns the stored row; its generated id is the `rKey` reported
    /// back to the dispatcher.
    pub async fn insert(
        pool: &PgPool,
        analysis_id: EntityId,
        plugin: &str,
        result: &serde_json::Value,
    ) -> Result<AnalysisResult, sqlx::Error> {
        let query = format!(
            "INSERT INTO analysis_results (result, analysis_id, plugin) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisResult>(&query)
            .bind(result)
            .bind(analysis_id)
            .bind(plugin)
            .fetch_one(pool)
            .await
    }
}
