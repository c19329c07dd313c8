//! Ordered, editable list of characters supplied to generation.

use shared::domain::CharacterEntry;

/// Stable reference to one roster row; never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryHandle(u64);

#[derive(Debug, Default, Clone)]
pub struct RosterStore {
    entries: Vec<(EntryHandle, CharacterEntry)>,
    next_handle: u64,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, traits: impl Into<String>) -> EntryHandle {
        let handle = EntryHandle(self.next_handle);
        self.next_handle += 1;
        self.entries
            .push((handle, CharacterEntry::new(name, traits)));
        handle
    }

    pub fn remove(&mut self, handle: EntryHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != handle);
        self.entries.len() != before
    }

    /// Returns whether the handle still referred to a live entry.
    pub fn update(
        &mut self,
        handle: EntryHandle,
        name: impl Into<String>,
        traits: impl Into<String>,
    ) -> bool {
        match self.entries.iter_mut().find(|(existing, _)| *existing == handle) {
            Some((_, entry)) => {
                entry.name = name.into();
                entry.traits = traits.into();
                true
            }
            None => false,
        }
    }

    /// Live rows in add order, including blank ones.
    pub fn rows(&self) -> impl Iterator<Item = (EntryHandle, &CharacterEntry)> {
        self.entries.iter().map(|(handle, entry)| (*handle, entry))
    }

    /// Trimmed copies of every entry with a non-empty name, in add order.
    /// The live rows are left untouched.
    pub fn snapshot(&self) -> Vec<CharacterEntry> {
        self.entries
            .iter()
            .filter_map(|(_, entry)| entry.submitted())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/roster_tests.rs"]
mod tests;
