use std::time::Duration;

use thiserror::Error;

/// Step of a send that can time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    Upload,
    Submit,
    Fetch,
}

impl std::fmt::Display for SendStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => f.write_str("attachment upload"),
            Self::Submit => f.write_str("message submission"),
            Self::Fetch => f.write_str("message list fetch"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Attachment upload failed: {0}")]
    UploadFailed(String),

    #[error("Uploader returned {got} URLs for {expected} files")]
    UploadCountMismatch { expected: usize, got: usize },

    #[error("Message submission failed: {0}")]
    TransportFailed(String),

    #[error("Server response carried no message id")]
    MissingServerId,

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: SendStage, after: Duration },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("No conversation is open")]
    NoActiveConversation,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;
