//! Conversation entity model (chat-driven analyses only).

use seqstack_core::types::{EntityId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `conversations` table, one per project.
///
/// `messages` is an ordered jsonb array; the R plugin stamps the running
/// analysis id onto the first message and backfills its `text`, `image`,
/// and `data` fields after a chat run.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Conversation {
    pub id: EntityId,
    pub project_id: EntityId,
    pub messages: serde_json::Value,
    pub created_at: Timestamp,
}
