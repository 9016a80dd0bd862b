//! Snapshot-based undo/redo over the clip store.
//!
//! Entries form a linear list with a cursor pointing at the entry that
//! matches the current store. Pushing from below the top discards the redo
//! branch. Restoring an entry raises a guard that suppresses pushes until
//! the caller reports that every downstream effect of the restore has run:
//!
//! ```ignore
//! if let Some(snapshot) = history.undo() {
//!     store.restore(&snapshot.clone());
//! }
//! // ... duration, mute sync and persistence react to the restored store ...
//! history.finish_restore();
//! ```

use serde::{Deserialize, Serialize};

use crate::clip::{AudioClip, VideoClip};

/// Immutable copy of every clip at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipSnapshot {
    pub clips: Vec<VideoClip>,
    pub audio_clips: Vec<AudioClip>,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Human-readable label of the edit that produced this state.
    pub label: String,
    pub snapshot: ClipSnapshot,
}

#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    max_entries: usize,
    restoring: bool,
}

impl HistoryManager {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            max_entries: max_entries.max(1),
            restoring: false,
        }
    }

    /// Record a new state. Returns `false` when the push was skipped, either
    /// because a restore is in flight or because nothing changed.
    pub fn push(&mut self, label: &str, snapshot: ClipSnapshot) -> bool {
        if self.restoring {
            tracing::debug!(label, "Push suppressed: undo/redo in progress");
            return false;
        }
        if self
            .entries
            .get(self.cursor)
            .is_some_and(|e| e.snapshot == snapshot)
        {
            tracing::trace!(label, "Push skipped: state unchanged");
            return false;
        }

        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(HistoryEntry {
            label: label.to_string(),
            snapshot,
        });
        self.cursor = self.entries.len() - 1;

        while self.entries.len() > self.max_entries {
            self.entries.remove(0);
            self.cursor -= 1;
        }

        tracing::debug!(
            label,
            depth = self.entries.len(),
            cursor = self.cursor,
            "History entry pushed"
        );
        true
    }

    /// Step back one entry. The returned snapshot must be restored by the
    /// caller, followed by [`HistoryManager::finish_restore`].
    pub fn undo(&mut self) -> Option<&ClipSnapshot> {
        if self.cursor == 0 || self.entries.is_empty() {
            return None;
        }
        self.cursor -= 1;
        self.restoring = true;
        let entry = &self.entries[self.cursor];
        tracing::debug!(label = %entry.label, cursor = self.cursor, "Undo");
        Some(&entry.snapshot)
    }

    pub fn redo(&mut self) -> Option<&ClipSnapshot> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.restoring = true;
        let entry = &self.entries[self.cursor];
        tracing::debug!(label = %entry.label, cursor = self.cursor, "Redo");
        Some(&entry.snapshot)
    }

    /// Lower the restore guard once the restored state has settled.
    pub fn finish_restore(&mut self) {
        self.restoring = false;
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn undo_label(&self) -> Option<&str> {
        if self.can_undo() {
            self.entries.get(self.cursor).map(|e| e.label.as_str())
        } else {
            None
        }
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.entries.get(self.cursor + 1).map(|e| e.label.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.restoring = false;
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}
