//! Analysis result entity model.

use seqstack_core::types::{EntityId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `analysis_results` table.
///
/// Inserted exactly once per handled job and never mutated. Other plugins
/// and the dispatcher retrieve the envelope through the row id reported
/// back as `rKey`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnalysisResult {
    pub id: EntityId,
    /// The full result envelope, stored verbatim.
    pub result: serde_json::Value,
    pub analysis_id: EntityId,
    pub plugin: String,
    pub created_at: Timestamp,
}
