//! The single source of truth for one open story session.

use std::sync::atomic::{AtomicBool, Ordering};

use shared::{
    domain::{Chapter, StoryId},
    protocol::StorySummary,
};

use crate::error::SessionStateError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorySession {
    id: Option<StoryId>,
    full_text: String,
    chapters: Vec<Chapter>,
    illustration_prompt: Option<String>,
}

impl StorySession {
    pub fn id(&self) -> Option<&StoryId> {
        self.id.as_ref()
    }

    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn illustration_prompt(&self) -> Option<&str> {
        self.illustration_prompt.as_deref()
    }

    pub fn start_new_session(&mut self) {
        self.id = None;
        self.full_text.clear();
        self.chapters.clear();
        self.illustration_prompt = None;
    }

    pub fn commit_identity(&mut self, id: StoryId) -> Result<(), SessionStateError> {
        if id.is_blank() {
            return Err(SessionStateError::EmptyIdentity);
        }
        self.id = Some(id);
        Ok(())
    }

    /// Replaces the whole chapter list in the order the service returned it.
    pub fn replace_chapters(&mut self, chapters: Vec<Chapter>) {
        self.chapters = chapters;
    }

    pub fn set_full_text(&mut self, text: impl Into<String>) {
        self.full_text = text.into();
    }

    pub fn set_illustration_prompt(&mut self, prompt: Option<String>) {
        self.illustration_prompt = prompt.filter(|prompt| !prompt.trim().is_empty());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Activity {
    #[default]
    Idle,
    GeneratingOutline,
    OutlineReady,
    GeneratingStory,
    StoryReady,
    Loading,
    AdvancingChapter,
    Illustrating,
    Deleting,
    Deleted,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChapterPane {
    #[default]
    List,
    Loading,
    Advancing,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Illustration {
    #[default]
    Hidden,
    Pending,
    Ready {
        url: String,
    },
    Failed(String),
}

/// Everything the view renderer projects from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub story: StorySession,
    pub activity: Activity,
    pub chapter_pane: ChapterPane,
    pub illustration: Illustration,
    pub listing: Vec<StorySummary>,
}

impl SessionState {
    /// Drops everything tied to the previous story before a new one is requested.
    pub fn start_new_session(&mut self) {
        self.story.start_new_session();
        self.chapter_pane = ChapterPane::List;
        self.illustration = Illustration::Hidden;
    }

    pub fn remove_listing_entry(&mut self, id: &StoryId) -> bool {
        let before = self.listing.len();
        self.listing.retain(|item| &item.id != id);
        self.listing.len() != before
    }
}

/// Single-flight guard for session-mutating requests.
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Claims the flag, or returns `None` when another action holds it.
    /// The flag is released when the guard drops, whatever the outcome.
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { flag: self })
    }
}

#[must_use = "the busy flag is released as soon as the guard is dropped"]
pub struct BusyGuard<'a> {
    flag: &'a BusyFlag,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
