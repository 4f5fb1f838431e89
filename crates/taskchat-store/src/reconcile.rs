//! Rules deciding when a speculative message has been confirmed.
//!
//! The server assigns its own ids, so a pending entry cannot be looked up
//! directly in the authoritative list. [`TimeWindowPolicy`] matches on
//! sender, exact text and an approximate timestamp. [`CorrelationPolicy`]
//! matches on the echoed client id when the backend returns one and falls
//! back to the time window otherwise.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use taskchat_shared::constants::RECONCILE_WINDOW_SECS;
use taskchat_shared::{Message, SenderKind};

use crate::error::StoreError;
use crate::models::SpeculativeMessage;

/// Decides whether `authoritative` is the confirmed form of `speculative`.
pub trait ReconciliationPolicy: Send + Sync + std::fmt::Debug {
    fn supersedes(&self, speculative: &SpeculativeMessage, authoritative: &Message) -> bool;
}

/// Sender + exact text + `|createdAt - createdAtLocal| < window`.
///
/// Two identical texts sent within the window are ambiguous under this rule.
#[derive(Debug, Clone)]
pub struct TimeWindowPolicy {
    self_kind: SenderKind,
    window: Duration,
}

impl TimeWindowPolicy {
    pub fn new(self_kind: SenderKind, window: Duration) -> Self {
        Self { self_kind, window }
    }

    pub fn with_default_window(self_kind: SenderKind) -> Self {
        Self::new(self_kind, Duration::from_secs(RECONCILE_WINDOW_SECS))
    }
}

impl ReconciliationPolicy for TimeWindowPolicy {
    fn supersedes(&self, speculative: &SpeculativeMessage, authoritative: &Message) -> bool {
        if authoritative.sender_kind != self.self_kind {
            return false;
        }
        if authoritative.text != speculative.text {
            return false;
        }
        let skew_ms = (authoritative.created_at - speculative.created_at_local)
            .num_milliseconds()
            .unsigned_abs();
        u128::from(skew_ms) < self.window.as_millis()
    }
}

/// Exact match on the echoed correlation id, time window otherwise.
#[derive(Debug, Clone)]
pub struct CorrelationPolicy {
    fallback: TimeWindowPolicy,
}

impl CorrelationPolicy {
    pub fn new(fallback: TimeWindowPolicy) -> Self {
        Self { fallback }
    }
}

impl ReconciliationPolicy for CorrelationPolicy {
    fn supersedes(&self, speculative: &SpeculativeMessage, authoritative: &Message) -> bool {
        match authoritative.client_message_id {
            Some(echoed) => echoed == speculative.local_id,
            None => self.fallback.supersedes(speculative, authoritative),
        }
    }
}

/// Which policy a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileMode {
    /// Sender + text + time window only.
    Heuristic,
    /// Correlation id when echoed, heuristic otherwise.
    #[default]
    Correlation,
}

impl ReconcileMode {
    pub fn build(self, self_kind: SenderKind, window: Duration) -> Arc<dyn ReconciliationPolicy> {
        let heuristic = TimeWindowPolicy::new(self_kind, window);
        match self {
            Self::Heuristic => Arc::new(heuristic),
            Self::Correlation => Arc::new(CorrelationPolicy::new(heuristic)),
        }
    }
}

impl FromStr for ReconcileMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "correlation" => Ok(Self::Correlation),
            other => Err(StoreError::UnknownReconcileMode(other.to_string())),
        }
    }
}
