use serde::{Deserialize, Serialize};

use crate::types::LocalId;

/// Body of a message create request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Trimmed message text; may be empty when attachments are present.
    pub text: String,
    /// Durable URLs returned by the uploader, in the user's selection order.
    pub attachment_urls: Vec<String>,
    /// Correlation id. Backends that do not understand it ignore it.
    pub client_message_id: LocalId,
}

/// Response of the batch upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub urls: Vec<String>,
}
