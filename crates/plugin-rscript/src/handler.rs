//! Job orchestration for the R plugin.
//!
//! The configuration's `type` field selects between two fixed scripts.
//! Chat jobs additionally maintain the project's conversation: the
//! analysis id is stamped onto the first message before the run, and the
//! run's payload is merged back into it afterwards.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use seqstack_core::config::{decode_section, validate_sample_name, ConfigError};
use seqstack_core::output::{AnalysisStatus, Output};
use seqstack_core::types::EntityId;
use seqstack_db::repositories::{AnalysisRepo, ConversationRepo, ResultRepo};
use seqstack_dispatch::{
    sample_directory, DispatcherMessage, HandlerOutcome, JobError, JobHandler,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::runner::RscriptRunner;

/// Script run for ordinary analysis jobs.
const DEFAULT_ANALYSIS_SCRIPT: &str = "/app/scripts/analysis.R";

/// Script run for chat jobs.
const DEFAULT_CHAT_SCRIPT: &str = "/app/scripts/chat.R";

/// Configuration `type` value that selects the chat flow.
const CHAT_TYPE: &str = "chat";

/// Configuration section the dispatcher stores for this plugin.
#[derive(Debug, Deserialize)]
pub struct RscriptConfig {
    /// Sample directory name under the organization's `samples/` tree.
    pub sample: String,
    /// Job variant; the literal `"chat"` selects the chat script and the
    /// conversation flow. Any other value runs the analysis script.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Project owning the conversation to stamp. Required for chat jobs,
    /// optional otherwise.
    #[serde(default)]
    pub project: Option<EntityId>,
}

impl RscriptConfig {
    fn is_chat(&self) -> bool {
        self.kind.as_deref() == Some(CHAT_TYPE)
    }
}

/// R job orchestration: config decode, script selection, conversation
/// bookkeeping, one runner invocation, result insert.
pub struct RscriptHandler {
    plugin_name: String,
    download_root: PathBuf,
    analysis_script: PathBuf,
    chat_script: PathBuf,
    runner: RscriptRunner,
}

impl RscriptHandler {
    pub fn new(plugin_name: impl Into<String>, download_root: PathBuf) -> Self {
        Self::with_scripts(
            plugin_name,
            download_root,
            PathBuf::from(DEFAULT_ANALYSIS_SCRIPT),
            PathBuf::from(DEFAULT_CHAT_SCRIPT),
            RscriptRunner::new(),
        )
    }

    /// Handler with custom scripts and runner; lets tests substitute stubs.
    pub fn with_scripts(
        plugin_name: impl Into<String>,
        download_root: PathBuf,
        analysis_script: PathBuf,
        chat_script: PathBuf,
        runner: RscriptRunner,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            download_root,
            analysis_script,
            chat_script,
            runner,
        }
    }

    async fn run_chat(
        &self,
        pool: &PgPool,
        message: &DispatcherMessage,
        config: &RscriptConfig,
        working_dir: &Path,
    ) -> Result<Output, JobError> {
        let project = config
            .project
            .ok_or(JobError::Config(ConfigError::MissingField("project")))?;

        ConversationRepo::ensure_for_project(pool, project).await?;
        ConversationRepo::stamp_first_message(pool, project, message.analysis_id).await?;

        tracing::info!(
            analysis_id = %message.analysis_id,
            project_id = %project,
            sample = %config.sample,
            "Running chat R script",
        );
        let output = self
            .runner
            .run(&self.chat_script, working_dir, message.analysis_id)
            .await?;

        // A failed run has nothing to merge; the stamped analysis id stays.
        if output.analysis_info.status == AnalysisStatus::Success {
            let updated = ConversationRepo::backfill_first_message(
                pool,
                project,
                output.result.text.as_deref(),
                output.result.image.as_deref(),
                &output.result.data,
            )
            .await?;
            if !updated {
                tracing::warn!(
                    project_id = %project,
                    "No conversation message to backfill",
                );
            }
        }

        Ok(output)
    }

    async fn run_analysis(
        &self,
        pool: &PgPool,
        message: &DispatcherMessage,
        config: &RscriptConfig,
        working_dir: &Path,
    ) -> Result<Output, JobError> {
        // Ordinary runs only link an existing conversation, they never
        // create one and never touch its content fields.
        if let Some(project) = config.project {
            let stamped =
                ConversationRepo::stamp_first_message(pool, project, message.analysis_id).await?;
            if !stamped {
                tracing::debug!(
                    project_id = %project,
                    "Project has no conversation to stamp",
                );
            }
        }

        tracing::info!(
            analysis_id = %message.analysis_id,
            sample = %config.sample,
            "Running analysis R script",
        );
        let output = self
            .runner
            .run(&self.analysis_script, working_dir, message.analysis_id)
            .await?;
        Ok(output)
    }
}

#[async_trait]
impl JobHandler for RscriptHandler {
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

        let config: RscriptConfig = decode_section(&analysis.config, &self.plugin_name)?;
        validate_sample_name(&config.sample)?;

        let working_dir =
            sample_directory(&self.download_root, message.organization_id, &config.sample);

        let output = if config.is_chat() {
            self.run_chat(pool, message, &config, &working_dir).await?
        } else {
            self.run_analysis(pool, message, &config, &working_dir)
                .await?
        };
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
