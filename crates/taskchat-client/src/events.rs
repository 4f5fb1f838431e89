use serde::Serialize;
use tokio::sync::broadcast;

use taskchat_shared::{ConversationId, LocalId, MessageId};

pub const EVENT_CONVERSATION_OPENED: &str = "conversation-opened";
pub const EVENT_REFRESHED: &str = "messages-refreshed";
pub const EVENT_SEND_FAILED: &str = "send-failed";
pub const EVENT_MESSAGE_DELETED: &str = "message-deleted";

/// Session-level notifications for the rendering layer. Changes to the
/// pending list itself are published by the speculative store.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    #[serde(rename_all = "camelCase")]
    ConversationOpened { conversation_id: ConversationId },
    #[serde(rename_all = "camelCase")]
    Refreshed {
        conversation_id: ConversationId,
        message_count: usize,
        superseded: usize,
    },
    #[serde(rename_all = "camelCase")]
    SendFailed {
        conversation_id: ConversationId,
        local_id: LocalId,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    MessageDeleted {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
}

impl ChatEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConversationOpened { .. } => EVENT_CONVERSATION_OPENED,
            Self::Refreshed { .. } => EVENT_REFRESHED,
            Self::SendFailed { .. } => EVENT_SEND_FAILED,
            Self::MessageDeleted { .. } => EVENT_MESSAGE_DELETED,
        }
    }
}

pub fn emit_event(tx: &broadcast::Sender<ChatEvent>, event: ChatEvent) {
    let name = event.name();
    if tx.send(event).is_err() {
        tracing::trace!(event = name, "No subscribers for event");
    }
}
