use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Conversation id is empty")]
    EmptyConversationId,

    #[error("Invalid conversation id: {0}")]
    InvalidConversationId(String),

    #[error("Unknown sender kind: {0}")]
    UnknownSenderKind(String),
}
