//! The send pipeline: optimistic insert, upload, submit, rollback.
//!
//! `send` does the only synchronous work (validation and inserting the
//! pending entry) and hands the rest to a spawned task. Each send owns its
//! own chain keyed by its [`LocalId`] and only ever touches that entry.
//!
//! On success the entry is left alone: the next authoritative refresh
//! removes it through reconciliation, whether that refresh lands before or
//! after the submit call returns. On failure the entry is removed and the
//! draft snapshot goes back into the compose box.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use taskchat_shared::constants::{
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_SEND_TIMEOUT_SECS, DEFAULT_UPLOAD_TIMEOUT_SECS,
};
use taskchat_shared::{
    ConversationId, LocalFile, LocalId, Message, MessageId, OutgoingMessage, Participant,
};
use taskchat_store::{SpeculativeMessage, SpeculativeMessageStore};

use crate::collaborators::Collaborators;
use crate::draft::{Draft, DraftHandle};
use crate::error::{ChatError, Result, SendStage};
use crate::events::{emit_event, ChatEvent};
use crate::feed::FeedCommand;
use crate::liveness::Liveness;
use crate::preview::build_previews;

/// Upper bounds on each remote call a send or refresh makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub upload: Duration,
    pub submit: Duration,
    pub fetch: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            upload: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            submit: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            fetch: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

/// How a send attempt ended.
#[derive(Debug)]
pub enum SendOutcome {
    /// The server accepted the message; reconciliation will retire the entry.
    Submitted(MessageId),
    /// The attempt failed; the entry was removed and the draft restored.
    RolledBack(ChatError),
    /// The conversation was closed before the attempt settled.
    Abandoned,
}

impl SendOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

/// Handle on an in-flight send. Dropping it does not cancel the send.
#[derive(Debug)]
pub struct SendHandle {
    local_id: LocalId,
    task: JoinHandle<SendOutcome>,
}

impl SendHandle {
    pub fn local_id(&self) -> LocalId {
        self.local_id
    }

    /// Wait for the chain to settle.
    pub async fn settled(self) -> SendOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(local_id = %self.local_id, error = %e, "Send task did not complete");
                SendOutcome::Abandoned
            }
        }
    }
}

/// Orchestrates sends for one conversation.
#[derive(Clone)]
pub struct ChatSendPipeline {
    me: Participant,
    store: SpeculativeMessageStore,
    collaborators: Collaborators,
    draft: Arc<dyn DraftHandle>,
    liveness: Liveness,
    timeouts: Timeouts,
    refresh_tx: Option<mpsc::Sender<FeedCommand>>,
    events: Option<broadcast::Sender<ChatEvent>>,
}

impl ChatSendPipeline {
    pub fn new(
        me: Participant,
        store: SpeculativeMessageStore,
        collaborators: Collaborators,
        draft: Arc<dyn DraftHandle>,
        liveness: Liveness,
    ) -> Self {
        Self {
            me,
            store,
            collaborators,
            draft,
            liveness,
            timeouts: Timeouts::default(),
            refresh_tx: None,
            events: None,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Ask this channel for a refresh after every accepted message.
    pub fn with_refresh_channel(mut self, tx: mpsc::Sender<FeedCommand>) -> Self {
        self.refresh_tx = Some(tx);
        self
    }

    pub fn with_events(mut self, tx: broadcast::Sender<ChatEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn conversation_id(&self) -> &ConversationId {
        self.store.conversation_id()
    }

    pub fn store(&self) -> &SpeculativeMessageStore {
        &self.store
    }

    /// Start sending `text` with `files`.
    ///
    /// The caller must already have cleared its draft; `text` and `files`
    /// are the snapshot restored on failure. Returns `None` when there is
    /// nothing to send or the conversation is closed. Must be called from
    /// within a tokio runtime.
    pub fn send(&self, text: impl Into<String>, files: Vec<LocalFile>) -> Option<SendHandle> {
        let snapshot = Draft::new(text, files);
        if snapshot.is_blank() {
            debug!(conversation = %self.conversation_id(), "Ignoring empty send");
            return None;
        }
        if !self.liveness.is_active() {
            debug!(conversation = %self.conversation_id(), "Ignoring send on closed conversation");
            return None;
        }

        let text = snapshot.text.trim().to_string();
        let entry = SpeculativeMessage::new(
            self.conversation_id().clone(),
            self.me.clone(),
            text.clone(),
            build_previews(&snapshot.files),
        );
        let local_id = entry.local_id;

        if let Err(e) = self.store.insert(entry) {
            warn!(local_id = %local_id, error = %e, "Could not queue speculative message");
            return None;
        }

        info!(
            conversation = %self.conversation_id(),
            local_id = %local_id,
            attachments = snapshot.files.len(),
            "Message queued"
        );

        let chain = SendChain {
            pipeline: self.clone(),
            local_id,
            text,
            snapshot,
        };
        Some(SendHandle {
            local_id,
            task: tokio::spawn(chain.run()),
        })
    }

    /// Send whatever is in the draft, clearing it first.
    ///
    /// A blank draft is left untouched. If the send cannot start after the
    /// draft was taken, its content goes straight back.
    pub fn send_draft(&self) -> Option<SendHandle> {
        if self.draft.get_draft().is_blank() {
            debug!(conversation = %self.conversation_id(), "Draft is blank, nothing to send");
            return None;
        }
        let draft = self.draft.take_draft();
        let restore = draft.clone();
        let handle = self.send(draft.text, draft.files);
        if handle.is_none() && !restore.is_blank() {
            debug!(conversation = %self.conversation_id(), "Send did not start, restoring draft");
            self.draft.restore_draft(restore);
        }
        handle
    }
}

struct SendChain {
    pipeline: ChatSendPipeline,
    local_id: LocalId,
    text: String,
    snapshot: Draft,
}

impl SendChain {
    async fn run(self) -> SendOutcome {
        let attachment_urls = if self.snapshot.files.is_empty() {
            Vec::new()
        } else {
            match self.upload().await {
                Ok(urls) => urls,
                Err(e) => return self.roll_back(e),
            }
        };

        // Nothing has reached the server yet, so a closed conversation
        // simply drops the attempt.
        if !self.pipeline.liveness.is_active() {
            debug!(local_id = %self.local_id, "Conversation closed before submit, dropping send");
            return SendOutcome::Abandoned;
        }

        let payload = OutgoingMessage {
            text: self.text.clone(),
            attachment_urls,
            client_message_id: self.local_id,
        };

        match self.submit(&payload).await {
            Ok(message) => self.accepted(message),
            Err(e) => self.roll_back(e),
        }
    }

    async fn upload(&self) -> Result<Vec<String>> {
        let files = &self.snapshot.files;
        debug!(local_id = %self.local_id, count = files.len(), "Uploading attachments");

        let urls = bounded(
            SendStage::Upload,
            self.pipeline.timeouts.upload,
            self.pipeline.collaborators.uploader.upload_files(files),
        )
        .await?;

        if urls.len() != files.len() {
            return Err(ChatError::UploadCountMismatch {
                expected: files.len(),
                got: urls.len(),
            });
        }
        if urls.iter().any(|u| u.trim().is_empty()) {
            return Err(ChatError::UploadFailed("uploader returned a blank URL".into()));
        }

        debug!(local_id = %self.local_id, count = urls.len(), "Attachments uploaded");
        Ok(urls)
    }

    async fn submit(&self, payload: &OutgoingMessage) -> Result<Message> {
        let message = bounded(
            SendStage::Submit,
            self.pipeline.timeouts.submit,
            self.pipeline
                .collaborators
                .transport
                .send_message(self.pipeline.conversation_id(), payload),
        )
        .await?;

        if !message.id.is_valid() {
            return Err(ChatError::MissingServerId);
        }
        Ok(message)
    }

    fn accepted(self, message: Message) -> SendOutcome {
        if !self.pipeline.liveness.is_active() {
            debug!(
                local_id = %self.local_id,
                message_id = %message.id,
                "Message accepted after conversation closed"
            );
            return SendOutcome::Abandoned;
        }

        info!(
            conversation = %self.pipeline.conversation_id(),
            local_id = %self.local_id,
            message_id = %message.id,
            "Message accepted"
        );

        if let Some(tx) = &self.pipeline.refresh_tx {
            // A full queue already holds a pending refresh.
            if tx.try_send(FeedCommand::Refresh).is_err() {
                debug!(local_id = %self.local_id, "Refresh already queued");
            }
        }
        SendOutcome::Submitted(message.id)
    }

    fn roll_back(self, error: ChatError) -> SendOutcome {
        if !self.pipeline.liveness.is_active() {
            debug!(local_id = %self.local_id, error = %error, "Ignoring failure of abandoned send");
            return SendOutcome::Abandoned;
        }

        warn!(
            conversation = %self.pipeline.conversation_id(),
            local_id = %self.local_id,
            error = %error,
            "Send failed, restoring draft"
        );

        self.pipeline.store.remove_by_local_id(&self.local_id);
        self.pipeline.draft.restore_draft(self.snapshot);

        if let Some(tx) = &self.pipeline.events {
            emit_event(
                tx,
                ChatEvent::SendFailed {
                    conversation_id: self.pipeline.conversation_id().clone(),
                    local_id: self.local_id,
                    error: error.to_string(),
                },
            );
        }
        SendOutcome::RolledBack(error)
    }
}

/// Run `fut` with a deadline, mapping expiry to [`ChatError::Timeout`].
pub(crate) async fn bounded<T, F>(stage: SendStage, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(ChatError::Timeout { stage, after }),
    }
}
