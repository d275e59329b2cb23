//! Rscript execution against a sample working directory.
//!
//! Mirrors the FastQC runner's contract: tool failures are envelope
//! content, only pre-run filesystem problems surface as `Err`. On top of
//! that, a successful run harvests the script's conventional artifacts
//! (`graph.png`, `result.txt`, `data.json`), renames each to
//! `<analysis_id>.<ext>` so concurrent jobs over one sample directory
//! cannot collide, and folds them into the payload.

use std::path::Path;

use seqstack_core::output::{build_output, AnalysisStatus, Output, PluginError, ResultPayload};
use seqstack_core::types::{EntityId, Timestamp};
use serde_json::{json, Value};

/// Fixed input file every R script consumes from the working directory.
const INPUT_FILE: &str = "data.h5";

/// Payload data reported when the sample holds no expression matrix.
const NO_INPUT_SENTINEL: &str = "no h5 file";

/// Public-facing description for any tool failure.
const PUBLIC_FAILURE: &str = "The script failed to execute";

/// Runs R scripts through the `Rscript` interpreter.
pub struct RscriptRunner {
    program: String,
}

impl Default for RscriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RscriptRunner {
    /// Runner invoking the `Rscript` interpreter from `PATH`.
    pub fn new() -> Self {
        Self {
            program: "Rscript".to_string(),
        }
    }

    /// Runner invoking an alternative program; lets tests substitute a
    /// stub executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `script` as `Rscript <script> <working_dir> data.h5`, then
    /// harvest generated artifacts into the payload.
    ///
    /// A missing `data.h5` is an expected outcome and yields a success
    /// envelope with the [`NO_INPUT_SENTINEL`] payload.
    pub async fn run(
        &self,
        script: &Path,
        working_dir: &Path,
        analysis_id: EntityId,
    ) -> Result<Output, std::io::Error> {
        let start = chrono::Utc::now();

        if !tokio::fs::try_exists(working_dir.join(INPUT_FILE)).await? {
            return Ok(build_output(
                start,
                ResultPayload::data(json!(NO_INPUT_SENTINEL)),
                AnalysisStatus::Success,
                Vec::new(),
            ));
        }

        let mut command = tokio::process::Command::new(&self.program);
        command.arg(script).arg(working_dir).arg(INPUT_FILE);

        let output = match command.output().await {
            Ok(output) => output,
            Err(e) => return Ok(tool_failure(start, e.to_string())),
        };

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Ok(tool_failure(start, combined));
        }

        let payload = harvest_artifacts(working_dir, analysis_id).await;
        Ok(build_output(
            start,
            payload,
            AnalysisStatus::Success,
            Vec::new(),
        ))
    }
}

/// Failure envelope embedding the captured tool output on the private
/// side only.
fn tool_failure(start: Timestamp, detail: String) -> Output {
    build_output(
        start,
        ResultPayload::empty(),
        AnalysisStatus::Failure,
        vec![PluginError::generic(detail, PUBLIC_FAILURE)],
    )
}

// ---------------------------------------------------------------------------
// Artifact harvesting
// ---------------------------------------------------------------------------

/// Rename and ingest the script's conventional output files.
///
/// The run already succeeded at this point, so any filesystem error here
/// counts as "artifact absent" and leaves the corresponding payload
/// field empty instead of failing the job.
async fn harvest_artifacts(working_dir: &Path, analysis_id: EntityId) -> ResultPayload {
    let image = claim_artifact(working_dir, "graph.png", analysis_id, "png").await;
    let text_file = claim_artifact(working_dir, "result.txt", analysis_id, "txt").await;
    let data_file = claim_artifact(working_dir, "data.json", analysis_id, "json").await;

    let text = match &text_file {
        Some(name) => read_joined_lines(&working_dir.join(name)).await,
        None => None,
    };
    let data = match &data_file {
        Some(name) => read_json(&working_dir.join(name))
            .await
            .unwrap_or(Value::Null),
        None => Value::Null,
    };

    ResultPayload { data, text, image }
}

/// Rename `source` to `<analysis_id>.<ext>` inside `working_dir`.
///
/// Returns the new file name, or `None` when the artifact was not
/// generated or cannot be renamed.
async fn claim_artifact(
    working_dir: &Path,
    source: &str,
    analysis_id: EntityId,
    ext: &str,
) -> Option<String> {
    let renamed = format!("{analysis_id}.{ext}");
    match tokio::fs::rename(working_dir.join(source), working_dir.join(&renamed)).await {
        Ok(()) => Some(renamed),
        Err(_) => None,
    }
}

/// Read a text artifact line by line, joined with `\n`.
async fn read_joined_lines(path: &Path) -> Option<String> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    Some(raw.lines().collect::<Vec<_>>().join("\n"))
}

/// Read and parse a JSON artifact.
async fn read_json(path: &Path) -> Option<Value> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    serde_json::from_str(&raw).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
