use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("API key not configured: {0}")]
    MissingKey(String),

    #[error("request to text-generation service failed: {0}")]
    Request(String),

    #[error("text-generation service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not parse text-generation response: {0}")]
    InvalidResponse(String),

    #[error("text-generation service returned an empty response")]
    EmptyResponse,

    #[error("could not serialize summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The normalized dataset is missing, unreadable or holds no events.
    #[error("event data unavailable at {path}: {reason}")]
    DataUnavailable { path: PathBuf, reason: String },

    #[error("narrative generation failed: {0}")]
    Narrative(#[from] NarrativeError),

    #[error("could not write results to {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
