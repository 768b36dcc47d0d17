//! Error taxonomy for the identification pipeline.
//!
//! Two families matter to callers:
//! - configuration errors: developer-facing, fail fast, retrying won't help
//! - runtime errors: user-facing, some of them worth a retake / retry

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error("Invalid AI provider '{0}' (expected openai, gemini or custom)")]
    UnknownProvider(String),

    #[error("{provider} provider is not configured: set {var}")]
    MissingConfig { provider: &'static str, var: &'static str },

    #[error("Failed to read image {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("{provider} API returned {status}: {message}")]
    Status {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("Could not parse {provider} response: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },

    #[error("Identification result rejected: {0}")]
    InvalidResult(String),

    #[error("Failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IdentifyError>;

impl IdentifyError {
    /// True for misconfiguration: unknown selector, missing key or URL.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            IdentifyError::UnknownProvider(_) | IdentifyError::MissingConfig { .. }
        )
    }

    /// True when asking the user to try again could produce a different outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            IdentifyError::Transport(_)
            | IdentifyError::Parse { .. }
            | IdentifyError::InvalidResult(_) => true,
            IdentifyError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

// The Gemini key rides in the query string, so the URL never goes into the message.
impl From<reqwest::Error> for IdentifyError {
    fn from(e: reqwest::Error) -> Self {
        IdentifyError::Transport(e.without_url().to_string())
    }
}
