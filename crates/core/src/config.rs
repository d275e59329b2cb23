//! Per-plugin configuration decoding.
//!
//! An analysis row carries a jsonb `config` object mapping plugin name to
//! an arbitrary configuration document. Decoding fails closed: a missing
//! section, a mistyped field, or a path-traversing sample name fails the
//! job before any tool runs.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Rejected plugin configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration section for plugin {0:?}")]
    MissingSection(String),

    #[error("missing required configuration field {0:?}")]
    MissingField(&'static str),

    #[error("invalid configuration section: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid sample name {0:?}")]
    InvalidSampleName(String),
}

/// Look up the configuration section for `plugin`.
///
/// A JSON `null` section counts as missing.
pub fn plugin_section<'a>(config: &'a Value, plugin: &str) -> Result<&'a Value, ConfigError> {
    config
        .get(plugin)
        .filter(|section| !section.is_null())
        .ok_or_else(|| ConfigError::MissingSection(plugin.to_string()))
}

/// Decode the configuration section for `plugin` into `T`.
pub fn decode_section<T: DeserializeOwned>(config: &Value, plugin: &str) -> Result<T, ConfigError> {
    let section = plugin_section(config, plugin)?;
    Ok(serde_json::from_value(section.clone())?)
}

/// Reject sample names that would escape the per-organization sample
/// directory. A sample name must be a single, plain path component.
pub fn validate_sample_name(name: &str) -> Result<(), ConfigError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if invalid {
        return Err(ConfigError::InvalidSampleName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
