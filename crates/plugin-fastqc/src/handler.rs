//! Job orchestration for the FastQC plugin.

use std::path::PathBuf;

use async_trait::async_trait;
use seqstack_core::config::{decode_section, validate_sample_name};
use seqstack_db::repositories::{AnalysisRepo, ResultRepo};
use seqstack_dispatch::{
    sample_directory, DispatcherMessage, HandlerOutcome, JobError, JobHandler,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::runner::FastqcRunner;

/// Configuration section the dispatcher stores for this plugin.
#[derive(Debug, Deserialize)]
pub struct FastqcConfig {
    /// Sample directory name under the organization's `samples/` tree.
    pub sample: String,
}

/// FastQC job orchestration: config decode, path resolution, one runner
/// invocation, result insert.
pub struct FastqcHandler {
    plugin_name: String,
    download_root: PathBuf,
    runner: FastqcRunner,
}

impl FastqcHandler {
    pub fn new(plugin_name: impl Into<String>, download_root: PathBuf) -> Self {
        Self::with_runner(plugin_name, download_root, FastqcRunner::new())
    }

    /// Handler with a custom runner; lets tests substitute a stub tool.
    pub fn with_runner(
        plugin_name: impl Into<String>,
        download_root: PathBuf,
        runner: FastqcRunner,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            download_root,
            runner,
        }
    }
}

#[async_trait]
impl JobHandler for FastqcHandler {
    fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    fn plugin_version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn handle(
        &self,
        pool: &PgPool,
        message: &DispatcherMessage,
    ) -> Result<HandlerOutcome, JobError> {
        let analysis = AnalysisRepo::find_by_id(pool, message.analysis_id)
            .await?
            .ok_or(JobError::AnalysisNotFound(message.analysis_id))?;

        let config: FastqcConfig = decode_section(&analysis.config, &self.plugin_name)?;
        validate_sample_name(&config.sample)?;

        let working_dir =
            sample_directory(&self.download_root, message.organization_id, &config.sample);

        tracing::info!(
            analysis_id = %message.analysis_id,
            sample = %config.sample,
            "Running FastQC",
        );
        let output = self.runner.run(&working_dir).await?;
        let status = output.analysis_info.status;

        let envelope = serde_json::to_value(&output)?;
        let stored =
            ResultRepo::insert(pool, message.analysis_id, &self.plugin_name, &envelope).await?;

        Ok(HandlerOutcome::with_result_key(status, stored.id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
