//! Wire messages exchanged with the dispatcher.
//!
//! Both directions use snake_case JSON. Unknown fields on inbound
//! messages are ignored so the dispatcher can evolve its payload without
//! breaking deployed workers.

use seqstack_core::output::AnalysisStatus;
use seqstack_core::types::EntityId;
use serde::{Deserialize, Serialize};

/// A job message consumed from `dispatcher_<plugin>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherMessage {
    pub organization_id: EntityId,
    pub analysis_id: EntityId,
    /// Plugin name the dispatcher addressed; informational, the queue
    /// name already routes the message.
    pub plugin: String,
}

/// Completion report published to the dispatcher's own queue after a
/// job was handled and its result envelope stored.
#[derive(Debug, Clone, Serialize)]
pub struct PluginCompletion {
    pub analysis_id: EntityId,
    pub plugin: String,
    pub version: String,
    pub status: AnalysisStatus,
    /// Reference payload consumed by downstream steps; holds the stored
    /// result row id under `rKey`.
    pub result: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
