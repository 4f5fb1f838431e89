//! Chat session: the state the rendering layer talks to.
//!
//! A session has at most one open conversation. Opening another one closes
//! the previous: its liveness flag drops, its pending messages are
//! discarded and its refresher stops. Calls still in flight for the old
//! conversation complete, but their results are ignored.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use taskchat_shared::constants::{
    DEFAULT_POLL_INTERVAL_SECS, EVENT_CHANNEL_CAPACITY, RECONCILE_WINDOW_SECS,
};
use taskchat_shared::{ConversationId, LocalFile, Message, MessageId, Participant};
use taskchat_store::{
    merge_timeline, ReconcileMode, SpeculativeMessage, SpeculativeMessageStore, StoreEvent,
    TimelineEntry,
};

use crate::collaborators::Collaborators;
use crate::draft::DraftHandle;
use crate::error::{ChatError, Result};
use crate::events::{emit_event, ChatEvent};
use crate::feed::{spawn_refresher, AuthoritativeFeed, FeedCommand, RefreshOutcome};
use crate::liveness::Liveness;
use crate::pipeline::{ChatSendPipeline, SendHandle, Timeouts};

/// Tunables applied to every conversation a session opens.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub timeouts: Timeouts,
    /// `None` disables periodic polling; refreshes then happen only on demand.
    pub poll_interval: Option<Duration>,
    pub reconcile_mode: ReconcileMode,
    pub reconcile_window: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            poll_interval: Some(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)),
            reconcile_mode: ReconcileMode::default(),
            reconcile_window: Duration::from_secs(RECONCILE_WINDOW_SECS),
        }
    }
}

/// Read model handed to the rendering layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    pub conversation_id: ConversationId,
    pub authoritative: Vec<Message>,
    pub speculative: Vec<SpeculativeMessage>,
}

impl ChatSnapshot {
    /// Both lists merged and sorted for display.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        merge_timeline(&self.authoritative, &self.speculative)
    }
}

struct ActiveConversation {
    pipeline: ChatSendPipeline,
    feed: AuthoritativeFeed,
    liveness: Liveness,
    refresh_tx: mpsc::Sender<FeedCommand>,
    refresher: JoinHandle<()>,
}

impl ActiveConversation {
    fn close(self) {
        self.liveness.deactivate();
        self.pipeline.store().clear();
        let _ = self.refresh_tx.try_send(FeedCommand::Shutdown);
        self.refresher.abort();
    }
}

pub struct ChatSession {
    me: Participant,
    collaborators: Collaborators,
    draft: Arc<dyn DraftHandle>,
    settings: SessionSettings,
    active: Mutex<Option<ActiveConversation>>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatSession {
    pub fn new(
        me: Participant,
        collaborators: Collaborators,
        draft: Arc<dyn DraftHandle>,
        settings: SessionSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            me,
            collaborators,
            draft,
            settings,
            active: Mutex::new(None),
            events,
        }
    }

    /// Open `conversation_id`, closing whatever was open before.
    ///
    /// Re-opening the conversation that is already open is a no-op. Must be
    /// called from within a tokio runtime.
    pub fn open_conversation(&self, conversation_id: ConversationId) {
        let previous = {
            let mut active = self.active.lock();
            if let Some(current) = active.as_ref() {
                if current.feed.conversation_id() == &conversation_id {
                    return;
                }
            }
            let opened = self.build_conversation(conversation_id.clone());
            active.replace(opened)
        };

        if let Some(previous) = previous {
            info!(
                from = %previous.feed.conversation_id(),
                to = %conversation_id,
                "Switching conversation"
            );
            previous.close();
        } else {
            info!(conversation = %conversation_id, "Conversation opened");
        }

        emit_event(&self.events, ChatEvent::ConversationOpened { conversation_id });
    }

    /// Close the open conversation, if any, discarding its pending messages.
    pub fn close_conversation(&self) {
        if let Some(previous) = self.active.lock().take() {
            info!(conversation = %previous.feed.conversation_id(), "Conversation closed");
            previous.close();
        }
    }

    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.feed.conversation_id().clone())
    }

    /// Send explicit content. See [`ChatSendPipeline::send`].
    pub fn send(&self, text: impl Into<String>, files: Vec<LocalFile>) -> Option<SendHandle> {
        let pipeline = self.active.lock().as_ref().map(|a| a.pipeline.clone())?;
        pipeline.send(text, files)
    }

    /// Send whatever is in the draft. See [`ChatSendPipeline::send_draft`].
    pub fn send_draft(&self) -> Option<SendHandle> {
        let pipeline = self.active.lock().as_ref().map(|a| a.pipeline.clone())?;
        pipeline.send_draft()
    }

    /// Fetch the authoritative list now and reconcile against it.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let feed = self.feed()?;
        feed.refresh().await
    }

    /// Signal that the server reported a change (push notification).
    pub fn notify_remote_change(&self) {
        if let Some(tx) = self.active.lock().as_ref().map(|a| a.refresh_tx.clone()) {
            if tx.try_send(FeedCommand::Refresh).is_err() {
                debug!("Refresh already queued");
            }
        }
    }

    /// Delete a confirmed message, then refresh.
    pub async fn delete_message(&self, message_id: &MessageId) -> Result<bool> {
        let feed = self.feed()?;
        let conversation_id = feed.conversation_id().clone();

        let deleted = self
            .collaborators
            .transport
            .delete_message(&conversation_id, message_id)
            .await?;

        if !deleted {
            debug!(conversation = %conversation_id, message_id = %message_id, "Message was already gone");
            return Ok(false);
        }

        info!(conversation = %conversation_id, message_id = %message_id, "Message deleted");
        emit_event(
            &self.events,
            ChatEvent::MessageDeleted {
                conversation_id,
                message_id: message_id.clone(),
            },
        );
        feed.refresh().await?;
        Ok(true)
    }

    pub fn snapshot(&self) -> Option<ChatSnapshot> {
        let feed = self.feed().ok()?;
        let (authoritative, speculative) = feed.snapshot();
        Some(ChatSnapshot {
            conversation_id: feed.conversation_id().clone(),
            authoritative,
            speculative,
        })
    }

    /// Merged, sorted view of the open conversation; empty when none is open.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.snapshot()
            .map(|s| s.timeline())
            .unwrap_or_default()
    }

    /// Pending entries of the open conversation, in insertion order.
    pub fn speculative_messages(&self) -> Vec<SpeculativeMessage> {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.pipeline.store().list())
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Pending-list changes of the open conversation.
    pub fn subscribe_store(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.pipeline.store().subscribe())
    }

    fn feed(&self) -> Result<AuthoritativeFeed> {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.feed.clone())
            .ok_or(ChatError::NoActiveConversation)
    }

    fn build_conversation(&self, conversation_id: ConversationId) -> ActiveConversation {
        let policy = self
            .settings
            .reconcile_mode
            .build(self.me.kind, self.settings.reconcile_window);
        let store = SpeculativeMessageStore::new(conversation_id, policy);
        let liveness = Liveness::new();

        let feed = AuthoritativeFeed::new(
            store.clone(),
            self.collaborators.transport.clone(),
            liveness.clone(),
            self.settings.timeouts.fetch,
        )
        .with_events(self.events.clone());

        let (refresh_tx, refresher) = spawn_refresher(feed.clone(), self.settings.poll_interval);

        let pipeline = ChatSendPipeline::new(
            self.me.clone(),
            store,
            self.collaborators.clone(),
            self.draft.clone(),
            liveness.clone(),
        )
        .with_timeouts(self.settings.timeouts)
        .with_refresh_channel(refresh_tx.clone())
        .with_events(self.events.clone());

        ActiveConversation {
            pipeline,
            feed,
            liveness,
            refresh_tx,
            refresher,
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.close();
        }
    }
}
