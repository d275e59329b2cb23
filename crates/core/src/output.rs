//! Result envelope assembly.
//!
//! Every job produces exactly one [`Output`] envelope, stored verbatim as
//! the `result` jsonb of the analysis result row. Assembly is pure so the
//! runners can be tested without a database.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Timestamp;

/// Error type tag used when a tool fails for no more specific reason.
pub const GENERIC_ERROR: &str = "GENERIC_ERROR";

/// Terminal status of an analysis run.
///
/// Expected absences (no input files) are reported as `Success` with a
/// sentinel payload, not as `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Failure,
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// One side of a reported error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContent {
    pub description: String,
    pub r#type: String,
}

/// A reported error with a detailed private side and a sanitized public
/// side. The public description must never contain raw tool output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginError {
    pub private: ErrorContent,
    pub public: ErrorContent,
}

impl PluginError {
    /// Build a [`GENERIC_ERROR`] pair from the given descriptions.
    pub fn generic(private: impl Into<String>, public: impl Into<String>) -> Self {
        Self {
            private: ErrorContent {
                description: private.into(),
                r#type: GENERIC_ERROR.to_string(),
            },
            public: ErrorContent {
                description: public.into(),
                r#type: GENERIC_ERROR.to_string(),
            },
        }
    }
}

/// Wall-clock timing block of an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTiming {
    /// RFC 3339 UTC timestamp with microsecond precision.
    pub analysis_start_time: String,
    /// RFC 3339 UTC timestamp with microsecond precision.
    pub analysis_end_time: String,
    /// Elapsed time in fractional seconds, never negative.
    pub analysis_delta_time: f64,
}

/// Status, errors, and timing of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInfo {
    pub status: AnalysisStatus,
    pub errors: Vec<PluginError>,
    pub time: AnalysisTiming,
}

/// Free-form payload of a run.
///
/// `data` is always present (JSON `null` when a run produced nothing);
/// `text` and `image` are only emitted when the tool generated the
/// corresponding artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPayload {
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ResultPayload {
    /// Payload carrying only a `data` value.
    pub fn data(data: Value) -> Self {
        Self {
            data,
            text: None,
            image: None,
        }
    }

    /// Payload with a `null` data value and no artifacts.
    pub fn empty() -> Self {
        Self::data(Value::Null)
    }
}

/// The result envelope persisted for every handled job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub result: ResultPayload,
    pub analysis_info: AnalysisInfo,
}

/// Compute the timing block for a run that started at `start` and ends now.
pub fn analysis_timing(start: Timestamp) -> AnalysisTiming {
    let end = chrono::Utc::now();
    let delta = (end - start)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    AnalysisTiming {
        analysis_start_time: start.to_rfc3339_opts(SecondsFormat::Micros, true),
        analysis_end_time: end.to_rfc3339_opts(SecondsFormat::Micros, true),
        analysis_delta_time: delta,
    }
}

/// Assemble the envelope for a run that started at `start`.
pub fn build_output(
    start: Timestamp,
    payload: ResultPayload,
    status: AnalysisStatus,
    errors: Vec<PluginError>,
) -> Output {
    Output {
        result: payload,
        analysis_info: AnalysisInfo {
            status,
            errors,
            time: analysis_timing(start),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
