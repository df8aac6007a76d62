//! Next/previous resolution against the caller's candidate list.
//!
//! The position of the current track is looked up on every change rather
//! than stored, so it can never disagree with the current track. A missing
//! or unknown current track counts as index `-1`: "next" lands on the first
//! candidate and "previous" on the last.

use std::sync::Arc;

use crate::types::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Ordered candidates: search results followed by the working playlist.
/// Duplicates are kept; lookups find the first occurrence.
#[derive(Debug, Clone, Default)]
pub struct TrackSequencer {
    candidates: Arc<[Track]>,
}

impl TrackSequencer {
    pub fn new(candidates: impl Into<Arc<[Track]>>) -> Self {
        Self {
            candidates: candidates.into(),
        }
    }

    pub fn set_candidates(&mut self, candidates: Arc<[Track]>) {
        self.candidates = candidates;
    }

    pub fn candidates(&self) -> &[Track] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Index of `current` in the candidates, if present.
    pub fn position_of(&self, current: Option<&Track>) -> Option<usize> {
        let current = current?;
        self.candidates.iter().position(|t| t.id == current.id)
    }

    /// Index the given direction resolves to, `None` for an empty list.
    pub fn resolve_index(&self, current: Option<&Track>, direction: Direction) -> Option<usize> {
        let len = self.candidates.len();
        if len == 0 {
            return None;
        }

        let index = self.position_of(current);
        let resolved = match (direction, index) {
            (Direction::Next, Some(i)) => (i + 1) % len,
            (Direction::Next, None) => 0,
            (Direction::Previous, Some(0) | None) => len - 1,
            (Direction::Previous, Some(i)) => i - 1,
        };
        Some(resolved)
    }

    pub fn resolve(&self, current: Option<&Track>, direction: Direction) -> Option<&Track> {
        self.resolve_index(current, direction)
            .and_then(|i| self.candidates.get(i))
    }
}
