//! # taskchat-client
//!
//! Task-scoped chat messaging with optimistic sends.
//!
//! A [`ChatSession`] owns the open conversation. Sending inserts a pending
//! message into the speculative store immediately, then uploads attachments
//! and submits the message in the background. The authoritative list is
//! refreshed periodically and after every accepted send; each refresh
//! retires the pending entries it confirms. Failed sends remove their entry
//! and put the text and files back into the draft.

pub mod collaborators;
pub mod config;
pub mod draft;
pub mod error;
pub mod events;
pub mod feed;
pub mod http;
pub mod liveness;
pub mod pipeline;
pub mod preview;
pub mod session;

use tracing_subscriber::{fmt, EnvFilter};

pub use collaborators::{AttachmentUploader, Collaborators, MessageTransport};
pub use config::ChatConfig;
pub use draft::{Draft, DraftHandle, SharedDraft};
pub use error::{ChatError, SendStage};
pub use events::ChatEvent;
pub use feed::{AuthoritativeFeed, FeedCommand, RefreshOutcome};
pub use http::HttpBackend;
pub use liveness::Liveness;
pub use pipeline::{ChatSendPipeline, SendHandle, SendOutcome, Timeouts};
pub use session::{ChatSession, ChatSnapshot, SessionSettings};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("taskchat_client=debug,taskchat_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
