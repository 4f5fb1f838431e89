//! Merged read model: confirmed and pending messages in one timeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use taskchat_shared::{Message, SenderKind};

use crate::models::SpeculativeMessage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TimelineEntry {
    Confirmed(Message),
    Pending(SpeculativeMessage),
}

impl TimelineEntry {
    /// Server time for confirmed messages, client time for pending ones.
    pub fn sort_key(&self) -> DateTime<Utc> {
        match self {
            Self::Confirmed(m) => m.created_at,
            Self::Pending(s) => s.created_at_local,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Confirmed(m) => &m.text,
            Self::Pending(s) => &s.text,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Whether the bubble should be aligned as the local user's.
    pub fn is_own(&self, self_kind: SenderKind) -> bool {
        match self {
            Self::Confirmed(m) => m.is_own(self_kind),
            Self::Pending(_) => true,
        }
    }
}

/// Concatenate both lists and sort by their respective timestamps.
///
/// The sort is stable, so entries with equal keys keep authoritative order
/// first and then insertion order.
pub fn merge_timeline(
    authoritative: &[Message],
    speculative: &[SpeculativeMessage],
) -> Vec<TimelineEntry> {
    let mut timeline: Vec<TimelineEntry> = authoritative
        .iter()
        .cloned()
        .map(TimelineEntry::Confirmed)
        .chain(speculative.iter().cloned().map(TimelineEntry::Pending))
        .collect();
    timeline.sort_by_key(TimelineEntry::sort_key);
    timeline
}
