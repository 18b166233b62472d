use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Status codes the geosearch service uses for overload and hiccups.
pub const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Fatal conditions. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input file {0:?} not found")]
    InputNotFound(PathBuf),

    #[error("output file {path:?} exists but cannot be read as a result table: {reason}")]
    MalformedOutput { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Failure of one logical geosearch request after the retry loop is done with it.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl RequestError {
    /// Whether the same request, sent again unchanged, may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RequestError::Transport(e) => e.is_connect() || e.is_timeout(),
            RequestError::Status { status, .. } => TRANSIENT_STATUSES.contains(&status.as_u16()),
            RequestError::Decode(_) | RequestError::InvalidEndpoint(_) => false,
        }
    }
}
