//! FastQC execution against a sample working directory.
//!
//! The runner owns the tool contract: input discovery, the report
//! directory, the `fastqc` invocation, and folding the outcome into a
//! result envelope. Tool failures are envelope content, not errors;
//! only pre-run filesystem problems surface as `Err`.

use std::path::{Path, PathBuf};

use seqstack_core::output::{build_output, AnalysisStatus, Output, PluginError, ResultPayload};
use seqstack_core::types::Timestamp;
use serde_json::json;

/// Suffix of the raw read files FastQC consumes.
const FASTQ_SUFFIX: &str = ".fastq.gz";

/// Subdirectory of the working directory receiving FastQC reports.
const REPORT_SUBDIR: &str = "fastqc";

/// Payload data reported when the sample holds no read files.
const NO_INPUT_SENTINEL: &str = "no fastq file";

/// Public-facing description for any tool failure. Raw tool output
/// stays on the private side of the error.
const PUBLIC_FAILURE: &str = "The script failed to execute";

/// Runs the `fastqc` binary over a sample directory.
pub struct FastqcRunner {
    program: String,
}

impl Default for FastqcRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FastqcRunner {
    /// Runner invoking the `fastqc` binary from `PATH`.
    pub fn new() -> Self {
        Self {
            program: "fastqc".to_string(),
        }
    }

    /// Runner invoking an alternative program; lets tests substitute a
    /// stub executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run FastQC over every `*.fastq.gz` file in `working_dir`.
    ///
    /// No input files is an expected outcome and yields a success
    /// envelope with the [`NO_INPUT_SENTINEL`] payload. A missing
    /// working directory counts the same way: the sample was never
    /// downloaded for this organization.
    pub async fn run(&self, working_dir: &Path) -> Result<Output, std::io::Error> {
        let start = chrono::Utc::now();

        let inputs = fastq_files(working_dir).await?;
        if inputs.is_empty() {
            return Ok(build_output(
                start,
                ResultPayload::data(json!(NO_INPUT_SENTINEL)),
                AnalysisStatus::Success,
                Vec::new(),
            ));
        }

        let report_dir = working_dir.join(REPORT_SUBDIR);
        tokio::fs::create_dir_all(&report_dir).await?;

        let mut command = tokio::process::Command::new(&self.program);
        command
            .arg("-o")
            .arg(&report_dir)
            .args(["-t", "1"])
            .args(&inputs);

        let output = match command.output().await {
            Ok(output) => output,
            Err(e) => return Ok(tool_failure(start, e.to_string())),
        };

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Ok(tool_failure(start, combined));
        }

        Ok(build_output(
            start,
            ResultPayload::data(json!("done")),
            AnalysisStatus::Success,
            Vec::new(),
        ))
    }
}

/// List the `*.fastq.gz` files in `dir`, sorted for a deterministic
/// argument order. A missing directory counts as zero matches.
async fn fastq_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_fastq = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(FASTQ_SUFFIX));
        if is_fastq {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
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
// Tests
// ---------------------------------------------------------------------------
