use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdError;

// Conversation identity = the task identifier assigned by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdError::EmptyConversationId);
        }
        if trimmed.contains('/') {
            return Err(IdError::InvalidConversationId(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned message id. Opaque to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A server id is usable only when it carries something besides whitespace.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-generated id of a speculative message, also sent to the server
/// as the correlation id of the create request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct LocalId(pub Uuid);

impl LocalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin tag of a message. The local user is whichever role they hold on
/// the task, so "own" messages are those whose kind equals the configured
/// self kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Poster,
    Tasker,
    Support,
    System,
    #[serde(other)]
    Unknown,
}

impl SenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poster => "poster",
            Self::Tasker => "tasker",
            Self::Support => "support",
            Self::System => "system",
            Self::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for SenderKind {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poster" => Ok(Self::Poster),
            "tasker" => Ok(Self::Tasker),
            "support" => Ok(Self::Support),
            "system" => Ok(Self::System),
            other => Err(IdError::UnknownSenderKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub participant_id: String,
    pub display_name: String,
    pub kind: SenderKind,
}

/// A server-confirmed chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: Participant,
    pub sender_kind: SenderKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachment_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Echo of the client correlation id, when the backend supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<LocalId>,
}

impl Message {
    pub fn is_own(&self, self_kind: SenderKind) -> bool {
        self.sender_kind == self_kind
    }
}

/// A file picked by the user, held in memory until it is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}
