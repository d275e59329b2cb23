//! Analysis entity model.

use seqstack_core::types::{EntityId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `analyses` table. Owned by the dispatcher; the plugins
/// only ever read it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Analysis {
    pub id: EntityId,
    /// Object mapping plugin name to that plugin's configuration document.
    pub config: serde_json::Value,
    pub created_at: Timestamp,
}
