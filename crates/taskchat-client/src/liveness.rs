use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "is this conversation still open" flag.
///
/// Every async continuation of a send or refresh checks it before touching
/// session state; results that arrive after the flag dropped are ignored.
#[derive(Debug, Clone)]
pub struct Liveness {
    active: Arc<AtomicBool>,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
