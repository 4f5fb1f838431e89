//! In-memory stand-ins for the upload service and the message endpoints.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use taskchat_client::{
    AttachmentUploader, ChatError, ChatSession, Collaborators, MessageTransport, SessionSettings,
    SharedDraft,
};
use taskchat_shared::{
    ConversationId, LocalFile, Message, MessageId, OutgoingMessage, Participant, SenderKind,
};

pub fn me() -> Participant {
    Participant {
        participant_id: "poster-1".into(),
        display_name: "Pat".into(),
        kind: SenderKind::Poster,
    }
}

pub fn tasker() -> Participant {
    Participant {
        participant_id: "tasker-7".into(),
        display_name: "Tess".into(),
        kind: SenderKind::Tasker,
    }
}

pub fn conversation(id: &str) -> ConversationId {
    ConversationId::parse(id).unwrap()
}

pub fn png(name: &str) -> LocalFile {
    LocalFile::new(name, "image/png", vec![0x89u8, b'P', b'N', b'G'])
}

pub fn pdf(name: &str) -> LocalFile {
    LocalFile::new(name, "application/pdf", b"%PDF-1.7".to_vec())
}

/// Settings for tests: no background polling, short deadlines.
pub fn quiet_settings() -> SessionSettings {
    let mut settings = SessionSettings {
        poll_interval: None,
        ..SessionSettings::default()
    };
    settings.timeouts.upload = Duration::from_secs(5);
    settings.timeouts.submit = Duration::from_secs(5);
    settings.timeouts.fetch = Duration::from_secs(5);
    settings
}

pub fn session(backend: &Arc<FakeBackend>, draft: &Arc<SharedDraft>) -> ChatSession {
    session_with(backend, draft, quiet_settings())
}

pub fn session_with(
    backend: &Arc<FakeBackend>,
    draft: &Arc<SharedDraft>,
    settings: SessionSettings,
) -> ChatSession {
    ChatSession::new(
        me(),
        Collaborators::from_backend(backend.clone()),
        draft.clone(),
        settings,
    )
}

/// Poll until `check` holds, yielding to other tasks in between.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[derive(Default)]
struct Behaviour {
    fail_uploads: bool,
    drop_one_url: bool,
    fail_submit_text: Option<String>,
    blank_ids: bool,
    echo_correlation: bool,
    clock_skew: chrono::Duration,
}

#[derive(Default)]
struct Recorded {
    messages: Vec<Message>,
    uploads: Vec<Vec<String>>,
    submits: Vec<OutgoingMessage>,
    fetches: usize,
    next_id: u64,
}

/// Fake backend implementing both collaborator traits.
///
/// A submitted message is persisted before the call waits on its gate, so a
/// held submit models a server that stored the message but has not answered.
pub struct FakeBackend {
    behaviour: Mutex<Behaviour>,
    recorded: Mutex<Recorded>,
    upload_gate: Option<Semaphore>,
    submit_gate: Option<Semaphore>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false, false))
    }

    /// Uploads wait for [`FakeBackend::release_uploads`].
    pub fn holding_uploads() -> Arc<Self> {
        Arc::new(Self::build(true, false))
    }

    /// Submits wait for [`FakeBackend::release_submits`].
    pub fn holding_submits() -> Arc<Self> {
        Arc::new(Self::build(false, true))
    }

    fn build(hold_uploads: bool, hold_submits: bool) -> Self {
        Self {
            behaviour: Mutex::new(Behaviour::default()),
            recorded: Mutex::new(Recorded::default()),
            upload_gate: hold_uploads.then(|| Semaphore::new(0)),
            submit_gate: hold_submits.then(|| Semaphore::new(0)),
        }
    }

    pub fn release_uploads(&self, n: usize) {
        if let Some(gate) = &self.upload_gate {
            gate.add_permits(n);
        }
    }

    pub fn release_submits(&self, n: usize) {
        if let Some(gate) = &self.submit_gate {
            gate.add_permits(n);
        }
    }

    pub fn fail_uploads(&self) {
        self.behaviour.lock().fail_uploads = true;
    }

    pub fn drop_one_url(&self) {
        self.behaviour.lock().drop_one_url = true;
    }

    pub fn fail_submit_of(&self, text: &str) {
        self.behaviour.lock().fail_submit_text = Some(text.to_string());
    }

    pub fn fail_all_submits(&self) {
        self.behaviour.lock().fail_submit_text = Some(String::new());
    }

    pub fn answer_with_blank_ids(&self) {
        self.behaviour.lock().blank_ids = true;
    }

    pub fn echo_correlation(&self) {
        self.behaviour.lock().echo_correlation = true;
    }

    pub fn skew_clock(&self, skew: chrono::Duration) {
        self.behaviour.lock().clock_skew = skew;
    }

    /// Add a message written by someone else.
    pub fn push_remote(&self, conversation_id: &ConversationId, sender: Participant, text: &str) -> MessageId {
        let mut recorded = self.recorded.lock();
        recorded.next_id += 1;
        let id = MessageId::new(format!("m{}", recorded.next_id));
        recorded.messages.push(Message {
            id: id.clone(),
            conversation_id: conversation_id.clone(),
            sender_kind: sender.kind,
            sender,
            text: text.to_string(),
            attachment_urls: Vec::new(),
            created_at: Utc::now(),
            client_message_id: None,
        });
        id
    }

    pub fn server_messages(&self) -> Vec<Message> {
        self.recorded.lock().messages.clone()
    }

    pub fn submits(&self) -> Vec<OutgoingMessage> {
        self.recorded.lock().submits.clone()
    }

    pub fn uploads(&self) -> Vec<Vec<String>> {
        self.recorded.lock().uploads.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.recorded.lock().fetches
    }

    fn should_fail_submit(&self, text: &str) -> bool {
        match &self.behaviour.lock().fail_submit_text {
            Some(t) if t.is_empty() => true,
            Some(t) => t == text,
            None => false,
        }
    }
}

#[async_trait]
impl AttachmentUploader for FakeBackend {
    async fn upload_files(&self, files: &[LocalFile]) -> Result<Vec<String>, ChatError> {
        if let Some(gate) = &self.upload_gate {
            gate.acquire().await.unwrap().forget();
        }

        let (fail, drop_one) = {
            let b = self.behaviour.lock();
            (b.fail_uploads, b.drop_one_url)
        };
        if fail {
            return Err(ChatError::UploadFailed("storage unavailable".into()));
        }

        let mut urls: Vec<String> = files
            .iter()
            .map(|f| format!("https://files.test/{}", f.name))
            .collect();
        self.recorded.lock().uploads.push(urls.clone());
        if drop_one {
            urls.pop();
        }
        Ok(urls)
    }
}

#[async_trait]
impl MessageTransport for FakeBackend {
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        payload: &OutgoingMessage,
    ) -> Result<Message, ChatError> {
        let failing = self.should_fail_submit(&payload.text);
        let (blank_ids, echo, skew) = {
            let b = self.behaviour.lock();
            (b.blank_ids, b.echo_correlation, b.clock_skew)
        };

        let message = {
            let mut recorded = self.recorded.lock();
            recorded.submits.push(payload.clone());
            if failing {
                None
            } else {
                recorded.next_id += 1;
                let me = me();
                let message = Message {
                    id: MessageId::new(format!("m{}", recorded.next_id)),
                    conversation_id: conversation_id.clone(),
                    sender_kind: me.kind,
                    sender: me,
                    text: payload.text.clone(),
                    attachment_urls: payload.attachment_urls.clone(),
                    created_at: Utc::now() + skew,
                    client_message_id: echo.then_some(payload.client_message_id),
                };
                recorded.messages.push(message.clone());
                Some(message)
            }
        };

        if let Some(gate) = &self.submit_gate {
            gate.acquire().await.unwrap().forget();
        }

        match message {
            None => Err(ChatError::TransportFailed("503 Service Unavailable".into())),
            Some(mut message) => {
                if blank_ids {
                    message.id = MessageId::new("");
                }
                Ok(message)
            }
        }
    }

    async fn fetch_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, ChatError> {
        let mut recorded = self.recorded.lock();
        recorded.fetches += 1;
        Ok(recorded
            .messages
            .iter()
            .filter(|m| &m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn delete_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<bool, ChatError> {
        let mut recorded = self.recorded.lock();
        let before = recorded.messages.len();
        recorded
            .messages
            .retain(|m| !(&m.conversation_id == conversation_id && &m.id == message_id));
        Ok(recorded.messages.len() != before)
    }
}
