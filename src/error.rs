//! Crate-level error type.
//!
//! Malformed wire frames are deliberately absent here: the interpreter skips
//! them locally and never surfaces them to the caller.

use thiserror::Error;

/// Errors surfaced by the assembler and its collaborators.
#[derive(Debug, Error)]
pub enum AssemblerError {
    /// The byte source failed mid-stream. Content accumulated before the
    /// failure is still available on the [`crate::stream::StreamBuffer`].
    #[error("stream read failed: {0}")]
    Transport(String),

    /// The agent endpoint replied with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    Http { status: u16, url: String, body: String },

    /// A send was attempted while another answer is still streaming.
    #[error("an answer is already streaming for message {0}")]
    StreamActive(String),

    /// The read task was abandoned before the terminal frame arrived.
    #[error("stream for message {0} was abandoned")]
    Abandoned(String),

    /// A stored transcript was neither a string nor an array of strings.
    #[error("invalid stored transcript: {0}")]
    Transcript(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for AssemblerError {
    fn from(e: reqwest::Error) -> Self {
        AssemblerError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AssemblerError>;
