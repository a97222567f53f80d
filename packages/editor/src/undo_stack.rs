//! # Undo/Redo Stack
//!
//! Per-session history of local transactions.
//!
//! ## Design
//!
//! - Each committed transaction records the before and after value of
//!   every raw key it wrote
//! - Undo writes `before` back, but only to keys that still hold `after`;
//!   a key changed since by another replica keeps the remote value
//! - Redo is the mirror image
//! - New local transactions clear the redo stack, remote ones do not
//! - Supports batched transactions (group several as one undo step)

use crate::document::{RawKey, RawState};
use std::collections::BTreeMap;

/// One raw key written by a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChange {
    pub key: RawKey,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Changes undone/redone together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryEntry {
    pub changes: Vec<KeyChange>,
}

impl HistoryEntry {
    pub fn new(changes: Vec<KeyChange>) -> Self {
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Fold a later entry into this one, keeping the earliest `before` of
    /// every key
    pub fn merge(&mut self, later: HistoryEntry) {
        for change in later.changes {
            match self.changes.iter_mut().find(|c| c.key == change.key) {
                Some(existing) => existing.after = change.after,
                None => self.changes.push(change),
            }
        }
        self.changes.retain(|c| c.before != c.after);
    }

    /// Writes that revert this entry against the current state
    pub fn revert_writes(&self, current: &RawState) -> BTreeMap<RawKey, Option<String>> {
        self.changes
            .iter()
            .filter(|c| current.get(&c.key) == c.after.as_ref())
            .map(|c| (c.key.clone(), c.before.clone()))
            .collect()
    }

    /// Writes that reapply this entry against the current state
    pub fn reapply_writes(&self, current: &RawState) -> BTreeMap<RawKey, Option<String>> {
        self.changes
            .iter()
            .filter(|c| current.get(&c.key) == c.before.as_ref())
            .map(|c| (c.key.clone(), c.after.clone()))
            .collect()
    }
}

/// Undo/redo stack for one document store
#[derive(Debug)]
pub struct UndoStack {
    /// Most recent last
    undo_stack: Vec<HistoryEntry>,

    /// Most recent last
    redo_stack: Vec<HistoryEntry>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    /// Currently building a batch
    current_batch: Option<HistoryEntry>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
        }
    }

    /// Record a committed local transaction
    pub fn record(&mut self, entry: HistoryEntry) {
        if entry.is_empty() {
            return;
        }

        // New local edits invalidate redo
        self.redo_stack.clear();

        match &mut self.current_batch {
            Some(batch) => batch.merge(entry),
            None => self.push_entry(entry),
        }
    }

    /// Start a batch (transactions until `end_batch` undo together)
    pub fn begin_batch(&mut self) {
        if self.current_batch.is_none() {
            self.current_batch = Some(HistoryEntry::default());
        }
    }

    /// End the current batch and push it to the undo stack
    pub fn end_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if !batch.is_empty() {
                self.push_entry(batch);
            }
        }
    }

    pub fn is_batching(&self) -> bool {
        self.current_batch.is_some()
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    /// Take the entry to undo next. An open batch is closed first.
    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.end_batch();
        self.undo_stack.pop()
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo_stack.pop()
    }

    /// Park an undone entry for redo
    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo_stack.push(entry);
    }

    /// Return a redone entry to the undo stack without touching redo
    pub fn push_undo(&mut self, entry: HistoryEntry) {
        self.push_entry(entry);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
            || self.current_batch.as_ref().is_some_and(|b| !b.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all undo/redo history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}
