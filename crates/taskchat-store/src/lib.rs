//! # taskchat-store
//!
//! Client-side state for the task chat: the speculative (pending) message
//! store, the rules that decide when a pending message has been confirmed by
//! the server, and the merged timeline handed to the rendering layer.
//!
//! Nothing here is persisted. Pending messages live only as long as the
//! conversation that created them is open.

pub mod models;
pub mod reconcile;
pub mod speculative;
pub mod view;

mod error;

pub use error::StoreError;
pub use models::*;
pub use reconcile::{CorrelationPolicy, ReconcileMode, ReconciliationPolicy, TimeWindowPolicy};
pub use speculative::{RemovalReason, SpeculativeMessageStore, StoreEvent};
pub use view::{merge_timeline, TimelineEntry};
