//! REST adapters for the collaborator traits.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Method   | Path                                   | Body / response                 |
//! |----------|----------------------------------------|---------------------------------|
//! | `POST`   | `/uploads`                             | multipart `files` -> `{"urls"}` |
//! | `POST`   | `/tasks/{conversation}/messages`       | `OutgoingMessage` -> `Message`  |
//! | `GET`    | `/tasks/{conversation}/messages`       | -> `[Message]`                  |
//! | `DELETE` | `/tasks/{conversation}/messages/{id}`  | 2xx deleted, 404 already gone   |

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use tracing::debug;

use taskchat_shared::constants::APP_NAME;
use taskchat_shared::{
    ConversationId, LocalFile, Message, MessageId, OutgoingMessage, UploadResponse,
};

use crate::collaborators::{AttachmentUploader, MessageTransport};
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(ChatError::InvalidConfig("API base URL cannot be empty".into()));
        }
        let base_url = Url::parse(trimmed)
            .map_err(|e| ChatError::InvalidConfig(format!("Invalid API base URL '{trimmed}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ChatError::InvalidConfig(format!(
                "API base URL '{trimmed}' cannot have paths appended"
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Self::new(&config.api_base_url, config.auth_token.clone())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ChatError::InvalidConfig(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn messages_url(&self, conversation_id: &ConversationId) -> Result<Url> {
        self.endpoint(&["tasks", conversation_id.as_str(), "messages"])
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-success status into [`ChatError::Status`].
    async fn ensure_success(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ChatError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AttachmentUploader for HttpBackend {
    async fn upload_files(&self, files: &[LocalFile]) -> Result<Vec<String>> {
        let mut form = Form::new();
        for file in files {
            let mime = match file.content_type.trim() {
                "" => "application/octet-stream",
                ct => ct,
            };
            let part = Part::bytes(file.data.to_vec())
                .file_name(file.name.clone())
                .mime_str(mime)?;
            form = form.part("files", part);
        }

        let url = self.endpoint(&["uploads"])?;
        debug!(url = %url, count = files.len(), "Uploading attachments");

        let resp = self
            .authorize(self.client.post(url))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = Self::ensure_success(resp).await?.json().await?;
        Ok(body.urls)
    }
}

#[async_trait]
impl MessageTransport for HttpBackend {
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        payload: &OutgoingMessage,
    ) -> Result<Message> {
        let url = self.messages_url(conversation_id)?;
        debug!(url = %url, local_id = %payload.client_message_id, "Submitting message");

        let resp = self
            .authorize(self.client.post(url))
            .json(payload)
            .send()
            .await?;
        let message = Self::ensure_success(resp).await?.json().await?;
        Ok(message)
    }

    async fn fetch_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        let url = self.messages_url(conversation_id)?;
        let resp = self.authorize(self.client.get(url)).send().await?;
        let messages = Self::ensure_success(resp).await?.json().await?;
        Ok(messages)
    }

    async fn delete_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<bool> {
        let url = self.endpoint(&[
            "tasks",
            conversation_id.as_str(),
            "messages",
            message_id.as_str(),
        ])?;

        let resp = self.authorize(self.client.delete(url)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::ensure_success(resp).await?;
        Ok(true)
    }
}
