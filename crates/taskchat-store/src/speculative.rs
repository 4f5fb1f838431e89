//! In-memory store of pending, not-yet-confirmed messages.
//!
//! One store exists per open conversation. It is cheap to clone; clones
//! share the same entries and subscriber channel. Every insert and removal
//! is broadcast to subscribers so the merged timeline can be re-rendered.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use taskchat_shared::constants::EVENT_CHANNEL_CAPACITY;
use taskchat_shared::{ConversationId, LocalId, Message, MessageId};

use crate::error::{Result, StoreError};
use crate::models::SpeculativeMessage;
use crate::reconcile::ReconciliationPolicy;

/// Why an entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RemovalReason {
    /// An authoritative message took its place.
    Superseded,
    /// Its send failed and the draft was restored.
    Failed,
    /// The conversation was closed while it was pending.
    Discarded,
}

/// Change notification for subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {
    Inserted { local_id: LocalId },
    Removed { local_id: LocalId, reason: RemovalReason },
}

#[derive(Debug, Default)]
struct StoreState {
    entries: Vec<SpeculativeMessage>,
    /// Authoritative messages that already retired an entry. They never
    /// retire another one, whichever pass sees them next.
    retired: HashSet<MessageId>,
}

#[derive(Debug, Clone)]
pub struct SpeculativeMessageStore {
    conversation_id: ConversationId,
    state: Arc<Mutex<StoreState>>,
    policy: Arc<dyn ReconciliationPolicy>,
    events: broadcast::Sender<StoreEvent>,
}

impl SpeculativeMessageStore {
    pub fn new(conversation_id: ConversationId, policy: Arc<dyn ReconciliationPolicy>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            conversation_id,
            state: Arc::new(Mutex::new(StoreState::default())),
            policy,
            events,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Append a pending entry. Its local id must not already be present.
    pub fn insert(&self, entry: SpeculativeMessage) -> Result<()> {
        if entry.conversation_id != self.conversation_id {
            return Err(StoreError::ConversationMismatch {
                expected: self.conversation_id.clone(),
                got: entry.conversation_id,
            });
        }
        if !entry.pending {
            return Err(StoreError::NotPending(entry.local_id));
        }

        let local_id = entry.local_id;
        {
            let mut state = self.state.lock();
            if state.entries.iter().any(|e| e.local_id == local_id) {
                return Err(StoreError::DuplicateLocalId(local_id));
            }
            state.entries.push(entry);
        }

        debug!(conversation = %self.conversation_id, local_id = %local_id, "Speculative message inserted");
        self.notify(StoreEvent::Inserted { local_id });
        Ok(())
    }

    /// Remove an entry after its send failed. Returns whether anything was removed.
    pub fn remove_by_local_id(&self, local_id: &LocalId) -> bool {
        self.remove_with_reason(local_id, RemovalReason::Failed)
    }

    pub fn remove_with_reason(&self, local_id: &LocalId, reason: RemovalReason) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let before = state.entries.len();
            state.entries.retain(|e| e.local_id != *local_id);
            state.entries.len() != before
        };

        if removed {
            debug!(
                conversation = %self.conversation_id,
                local_id = %local_id,
                ?reason,
                "Speculative message removed"
            );
            self.notify(StoreEvent::Removed {
                local_id: *local_id,
                reason,
            });
        }
        removed
    }

    /// Drop every entry superseded by a message of `authoritative`.
    ///
    /// Each authoritative message supersedes at most one entry over the
    /// life of the store, entries being considered in insertion order.
    /// Returns the removed ids.
    pub fn reconcile(&self, authoritative: &[Message]) -> Vec<LocalId> {
        let superseded = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            // Forget ids the server no longer lists (deleted messages).
            let listed: HashSet<&MessageId> = authoritative.iter().map(|m| &m.id).collect();
            state.retired.retain(|id| listed.contains(id));

            let retired = &mut state.retired;
            let mut claimed: Vec<bool> = authoritative
                .iter()
                .map(|m| retired.contains(&m.id))
                .collect();
            let mut superseded = Vec::new();

            state.entries.retain(|entry| {
                let hit = authoritative
                    .iter()
                    .enumerate()
                    .find(|(i, msg)| !claimed[*i] && self.policy.supersedes(entry, msg))
                    .map(|(i, msg)| (i, msg.id.clone()));

                match hit {
                    Some((i, message_id)) => {
                        claimed[i] = true;
                        retired.insert(message_id.clone());
                        debug!(
                            local_id = %entry.local_id,
                            message_id = %message_id,
                            "Speculative message confirmed"
                        );
                        superseded.push(entry.local_id);
                        false
                    }
                    None => true,
                }
            });
            superseded
        };

        for local_id in &superseded {
            self.notify(StoreEvent::Removed {
                local_id: *local_id,
                reason: RemovalReason::Superseded,
            });
        }
        superseded
    }

    /// Pending entries in insertion order.
    pub fn list(&self) -> Vec<SpeculativeMessage> {
        self.state.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Discard everything, e.g. when the conversation is closed. Retired
    /// confirmations are forgotten too.
    pub fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.state.lock()).entries;
        if !drained.is_empty() {
            warn!(
                conversation = %self.conversation_id,
                count = drained.len(),
                "Discarding pending messages"
            );
        }
        for entry in &drained {
            self.notify(StoreEvent::Removed {
                local_id: entry.local_id,
                reason: RemovalReason::Discarded,
            });
        }
        drained.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: StoreEvent) {
        // No receivers is fine: nothing is rendering this conversation.
        let _ = self.events.send(event);
    }
}
