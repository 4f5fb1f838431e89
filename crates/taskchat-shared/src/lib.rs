//! Types shared by the taskchat crates: identifiers, the authoritative
//! message model, and the JSON shapes exchanged with the backend.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::IdError;
pub use protocol::{OutgoingMessage, UploadResponse};
pub use types::{ConversationId, LocalFile, LocalId, Message, MessageId, Participant, SenderKind};
