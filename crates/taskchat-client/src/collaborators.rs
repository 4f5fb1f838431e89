//! Seams to the services this crate consumes but does not implement:
//! the file storage upload service and the REST message endpoints.
//!
//! [`crate::http::HttpBackend`] implements both against the real backend;
//! tests provide in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;

use taskchat_shared::{ConversationId, LocalFile, Message, MessageId, OutgoingMessage};

use crate::error::Result;

#[async_trait]
pub trait AttachmentUploader: Send + Sync {
    /// Upload a batch as a unit: one durable URL per file, in input order,
    /// or an error if any file failed.
    async fn upload_files(&self, files: &[LocalFile]) -> Result<Vec<String>>;
}

#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Create a message. The returned message carries the server id and time.
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        payload: &OutgoingMessage,
    ) -> Result<Message>;

    /// Full authoritative list, oldest first. Safe to call repeatedly.
    async fn fetch_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>>;

    /// Returns `false` when the server had no such message.
    async fn delete_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<bool>;
}

/// The pair of services a chat session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub uploader: Arc<dyn AttachmentUploader>,
    pub transport: Arc<dyn MessageTransport>,
}

impl Collaborators {
    pub fn new(uploader: Arc<dyn AttachmentUploader>, transport: Arc<dyn MessageTransport>) -> Self {
        Self { uploader, transport }
    }

    /// Use one backend for both roles.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: AttachmentUploader + MessageTransport + 'static,
    {
        Self {
            uploader: backend.clone(),
            transport: backend,
        }
    }
}
