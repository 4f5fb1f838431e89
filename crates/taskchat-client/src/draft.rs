//! Compose-box state as seen by the send pipeline.
//!
//! The pipeline never owns the draft. It reads and writes it through a
//! [`DraftHandle`] so that a failed send can put the user's text and files
//! back without knowing anything about the UI holding them.

use std::sync::Arc;

use parking_lot::Mutex;

use taskchat_shared::LocalFile;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
    pub files: Vec<LocalFile>,
}

impl Draft {
    pub fn new(text: impl Into<String>, files: Vec<LocalFile>) -> Self {
        Self {
            text: text.into(),
            files,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.files.is_empty()
    }

    /// Nothing worth sending: whitespace-only text and no files.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.files.is_empty()
    }

    /// Merge a rolled-back snapshot with whatever the user typed since.
    ///
    /// An empty current draft is replaced by the snapshot verbatim. Otherwise
    /// the snapshot's text and files go first.
    pub fn absorb(self, snapshot: Draft) -> Draft {
        if self.is_empty() {
            return snapshot;
        }
        let text = match (snapshot.text.is_empty(), self.text.is_empty()) {
            (true, _) => self.text,
            (false, true) => snapshot.text,
            (false, false) => format!("{}\n{}", snapshot.text, self.text),
        };
        let mut files = snapshot.files;
        files.extend(self.files);
        Draft { text, files }
    }
}

pub trait DraftHandle: Send + Sync {
    fn get_draft(&self) -> Draft;

    fn set_draft(&self, draft: Draft);

    /// Read and clear the draft.
    fn take_draft(&self) -> Draft {
        let draft = self.get_draft();
        self.set_draft(Draft::default());
        draft
    }

    /// Put a failed send's content back without losing newer input.
    fn restore_draft(&self, snapshot: Draft) {
        let current = self.get_draft();
        self.set_draft(current.absorb(snapshot));
    }
}

/// In-memory draft shared between the input layer and the pipeline.
#[derive(Debug, Clone, Default)]
pub struct SharedDraft {
    inner: Arc<Mutex<Draft>>,
}

impl SharedDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.inner.lock().text = text.into();
    }

    pub fn add_file(&self, file: LocalFile) {
        self.inner.lock().files.push(file);
    }

    pub fn text(&self) -> String {
        self.inner.lock().text.clone()
    }

    pub fn files(&self) -> Vec<LocalFile> {
        self.inner.lock().files.clone()
    }
}

impl DraftHandle for SharedDraft {
    fn get_draft(&self) -> Draft {
        self.inner.lock().clone()
    }

    fn set_draft(&self, draft: Draft) {
        *self.inner.lock() = draft;
    }

    fn take_draft(&self) -> Draft {
        std::mem::take(&mut *self.inner.lock())
    }

    fn restore_draft(&self, snapshot: Draft) {
        let mut guard = self.inner.lock();
        let current = std::mem::take(&mut *guard);
        *guard = current.absorb(snapshot);
    }
}
