//! Error types for everything around the rules engine.
//!
//! The catalog and the rules themselves are total and have no error type.

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading the TOML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// `LLM_PROVIDER` named a provider we do not support.
    #[error("unknown LLM provider: {0}")]
    UnknownProvider(String),
}

/// Errors from the vision model that reads the note.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{var} env var required for the {provider} provider")]
    MissingApiKey {
        provider: &'static str,
        var: &'static str,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("empty response from LLM")]
    EmptyResponse,

    /// The reply had no recognisable JSON object in it.
    #[error("no JSON object found in LLM response")]
    NoJson,

    #[error("failed to parse LLM response: {source}\nRaw: {raw}")]
    Json {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("all OpenRouter models failed; last error: {last}")]
    AllModelsFailed { last: Box<ExtractError> },

    #[error("no OpenRouter models configured")]
    NoModels,
}

/// Errors while processing one delivery note end to end.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read image {path}: {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image is empty: {path}")]
    EmptyImage { path: PathBuf },

    #[error(transparent)]
    Extract(#[from] ExtractError),
}
