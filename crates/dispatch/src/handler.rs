//! Job handling seam between the listener and the plugin crates.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use seqstack_core::config::ConfigError;
use seqstack_core::output::AnalysisStatus;
use seqstack_core::types::EntityId;
use serde_json::json;
use sqlx::PgPool;

use crate::message::DispatcherMessage;

/// Subdirectory of each organization's download tree holding samples.
const SAMPLES_DIR: &str = "samples";

/// Per-job failures surfaced to the listener.
///
/// None of these kill the worker. The listener logs the error and nacks
/// the delivery: requeue on first delivery, dead-letter on redelivery.
/// Tool failures are not errors at this level; the runners fold those
/// into a failure envelope that is stored like any other result.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("analysis {0} not found")]
    AnalysisNotFound(EntityId),

    #[error("malformed plugin configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode result envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome reported to the dispatcher for a handled job.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub status: AnalysisStatus,
    /// Reference payload published back to the dispatcher.
    pub result: serde_json::Value,
}

impl HandlerOutcome {
    /// Outcome referencing the stored result row under `rKey`.
    pub fn with_result_key(status: AnalysisStatus, result_id: EntityId) -> Self {
        Self {
            status,
            result: json!({ "rKey": result_id }),
        }
    }
}

/// One plugin's job orchestration: resolve configuration and sample
/// directory, run the tool, persist the envelope, report the reference.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Queue-facing plugin name; the listener consumes `dispatcher_<name>`.
    fn plugin_name(&self) -> &str;

    /// Version reported in completion messages.
    fn plugin_version(&self) -> &str;

    /// Handle one job message. Invokes the external tool at most once.
    async fn handle(
        &self,
        pool: &PgPool,
        message: &DispatcherMessage,
    ) -> Result<HandlerOutcome, JobError>;
}

/// Resolve the working directory for a job's sample:
/// `<download_root>/<organization_id>/samples/<sample>`.
///
/// `sample` must have passed
/// [`validate_sample_name`](seqstack_core::config::validate_sample_name)
/// first.
pub fn sample_directory(
    download_root: &Path,
    organization_id: EntityId,
    sample: &str,
) -> PathBuf {
    download_root
        .join(organization_id.to_string())
        .join(SAMPLES_DIR)
        .join(sample)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
