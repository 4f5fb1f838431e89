//! Client-side models that never reach the server.
//!
//! Every struct derives `Serialize` so it can be handed directly to the
//! rendering layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taskchat_shared::{ConversationId, LocalId, Participant, SenderKind};

// ---------------------------------------------------------------------------
// AttachmentPreview
// ---------------------------------------------------------------------------

/// Stand-in for an attachment whose upload has not completed yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPreview {
    /// Original file name.
    pub file_name: String,
    /// MIME type reported by the picker.
    pub content_type: String,
    /// Ephemeral inline URL; `None` for files that cannot be previewed.
    pub preview_url: Option<String>,
}

// ---------------------------------------------------------------------------
// SpeculativeMessage
// ---------------------------------------------------------------------------

/// A locally created message shown before the server has confirmed it.
///
/// Entries are never mutated once stored: they are removed when an
/// authoritative counterpart shows up or when their send fails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpeculativeMessage {
    /// Client-generated id, unique within the process.
    pub local_id: LocalId,
    /// The conversation the message is being sent to.
    pub conversation_id: ConversationId,
    /// The local user.
    pub sender: Participant,
    /// Origin tag, always the local user's kind.
    pub sender_kind: SenderKind,
    /// Trimmed text, identical to what is submitted.
    pub text: String,
    /// One entry per selected file, in selection order.
    pub attachment_previews: Vec<AttachmentPreview>,
    /// Client clock at creation. Only used for reconciliation and ordering.
    pub created_at_local: DateTime<Utc>,
    /// True for as long as the entry exists.
    pub pending: bool,
}

impl SpeculativeMessage {
    /// Build a pending entry stamped with the current client time.
    pub fn new(
        conversation_id: ConversationId,
        sender: Participant,
        text: impl Into<String>,
        attachment_previews: Vec<AttachmentPreview>,
    ) -> Self {
        Self::new_at(conversation_id, sender, text, attachment_previews, Utc::now())
    }

    /// Build a pending entry with an explicit creation time.
    pub fn new_at(
        conversation_id: ConversationId,
        sender: Participant,
        text: impl Into<String>,
        attachment_previews: Vec<AttachmentPreview>,
        created_at_local: DateTime<Utc>,
    ) -> Self {
        let sender_kind = sender.kind;
        Self {
            local_id: LocalId::new(),
            conversation_id,
            sender,
            sender_kind,
            text: text.into(),
            attachment_previews,
            created_at_local,
            pending: true,
        }
    }
}
