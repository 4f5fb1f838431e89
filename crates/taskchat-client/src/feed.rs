//! Authoritative message list for the open conversation.
//!
//! [`AuthoritativeFeed::refresh`] fetches the server's list, replaces the
//! cached copy and reconciles the speculative store against it in one
//! critical section, so a snapshot never shows a pending entry next to its
//! confirmed counterpart. The refresher task drives it periodically and on
//! demand through a [`FeedCommand`] channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use taskchat_shared::{ConversationId, Message};
use taskchat_store::{SpeculativeMessage, SpeculativeMessageStore};

use crate::collaborators::MessageTransport;
use crate::error::{Result, SendStage};
use crate::events::{emit_event, ChatEvent};
use crate::liveness::Liveness;
use crate::pipeline::bounded;

/// Depth of the refresh request queue. One queued request is enough.
const FEED_COMMAND_CAPACITY: usize = 4;

/// Commands sent *into* the refresher task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedCommand {
    /// Fetch and reconcile now.
    Refresh,
    /// Stop the task.
    Shutdown,
}

/// Result of one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied {
        message_count: usize,
        superseded: usize,
    },
    /// A newer fetch had already been applied, or the conversation closed.
    Stale,
}

#[derive(Debug, Default)]
struct FeedState {
    messages: Vec<Message>,
    applied_ticket: u64,
}

#[derive(Clone)]
pub struct AuthoritativeFeed {
    store: SpeculativeMessageStore,
    transport: Arc<dyn MessageTransport>,
    liveness: Liveness,
    fetch_timeout: Duration,
    state: Arc<Mutex<FeedState>>,
    next_ticket: Arc<AtomicU64>,
    events: Option<broadcast::Sender<ChatEvent>>,
}

impl AuthoritativeFeed {
    pub fn new(
        store: SpeculativeMessageStore,
        transport: Arc<dyn MessageTransport>,
        liveness: Liveness,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            liveness,
            fetch_timeout,
            state: Arc::new(Mutex::new(FeedState::default())),
            next_ticket: Arc::new(AtomicU64::new(0)),
            events: None,
        }
    }

    pub fn with_events(mut self, tx: broadcast::Sender<ChatEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn conversation_id(&self) -> &ConversationId {
        self.store.conversation_id()
    }

    /// Fetch the authoritative list and reconcile pending entries against it.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let conversation_id = self.conversation_id().clone();

        let mut fetched = bounded(
            SendStage::Fetch,
            self.fetch_timeout,
            self.transport.fetch_messages(&conversation_id),
        )
        .await?;

        if !self.liveness.is_active() {
            debug!(conversation = %conversation_id, "Dropping fetch for closed conversation");
            return Ok(RefreshOutcome::Stale);
        }

        let before = fetched.len();
        fetched.retain(|m| m.conversation_id == conversation_id);
        if fetched.len() != before {
            warn!(
                conversation = %conversation_id,
                dropped = before - fetched.len(),
                "Fetched list contained messages of other conversations"
            );
        }
        fetched.sort_by_key(|m| m.created_at);

        let (message_count, superseded) = {
            let mut state = self.state.lock();
            if ticket <= state.applied_ticket {
                debug!(conversation = %conversation_id, ticket, "Discarding out-of-date fetch");
                return Ok(RefreshOutcome::Stale);
            }
            state.applied_ticket = ticket;
            state.messages = fetched;
            let superseded = self.store.reconcile(&state.messages).len();
            (state.messages.len(), superseded)
        };

        debug!(
            conversation = %conversation_id,
            messages = message_count,
            superseded,
            "Authoritative list refreshed"
        );
        if let Some(tx) = &self.events {
            emit_event(
                tx,
                ChatEvent::Refreshed {
                    conversation_id,
                    message_count,
                    superseded,
                },
            );
        }

        Ok(RefreshOutcome::Applied {
            message_count,
            superseded,
        })
    }

    /// Consistent pair of (authoritative, speculative) lists.
    pub fn snapshot(&self) -> (Vec<Message>, Vec<SpeculativeMessage>) {
        let state = self.state.lock();
        (state.messages.clone(), self.store.list())
    }

    async fn refresh_logged(&self) {
        if let Err(e) = self.refresh().await {
            warn!(conversation = %self.conversation_id(), error = %e, "Refresh failed");
        }
    }
}

/// Spawn the refresher task for `feed`.
///
/// With a `poll_interval` the first refresh happens immediately and then on
/// every tick; without one the task only answers [`FeedCommand::Refresh`].
/// The task ends on [`FeedCommand::Shutdown`], when every sender is dropped,
/// or once the conversation is closed.
pub fn spawn_refresher(
    feed: AuthoritativeFeed,
    poll_interval: Option<Duration>,
) -> (mpsc::Sender<FeedCommand>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(FEED_COMMAND_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut ticker = poll_interval.map(|period| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        info!(conversation = %feed.conversation_id(), ?poll_interval, "Refresher started");

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(FeedCommand::Refresh) => feed.refresh_logged().await,
                    Some(FeedCommand::Shutdown) | None => break,
                },
                _ = next_tick(&mut ticker) => feed.refresh_logged().await,
            }

            if !feed.liveness.is_active() {
                break;
            }
        }

        debug!(conversation = %feed.conversation_id(), "Refresher stopped");
    });

    (tx, handle)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
