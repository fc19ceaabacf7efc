use std::time::{Duration, Instant};

/// Tuning for [`History`]. Defaults match interactive editing: a bounded
/// stack deep enough for a working session and a coalescing window that folds
/// slider drags into one entry.
#[derive(Clone, Copy, Debug)]
pub struct HistoryOpts {
    pub max_entries: usize,
    pub debounce: Duration,
}

impl Default for HistoryOpts {
    fn default() -> Self {
        Self {
            max_entries: 50,
            debounce: Duration::from_millis(300),
        }
    }
}

/// Bounded snapshot history over a cloneable state.
///
/// Three zones: `past` (undoable), `present` (authoritative), `future`
/// (redoable). Every accepted edit clears `future`; undo and redo are
/// symmetric moves between the zones. Edits landing within the debounce
/// window of the previous commit replace the present in place instead of
/// growing `past`, so a burst of rapid edits undoes as a single step.
#[derive(Debug)]
pub struct History<T: Clone + PartialEq> {
    past: Vec<T>,
    present: T,
    future: Vec<T>,
    opts: HistoryOpts,
    // Anchor of the coalescing window. Only advanced by a non-coalesced
    // commit, so a continuous burst keeps folding into one entry until a
    // gap of at least `opts.debounce` occurs.
    last_commit: Option<Instant>,
}

impl<T: Clone + PartialEq> History<T> {
    pub fn new(initial: T) -> Self {
        Self::with_opts(initial, HistoryOpts::default())
    }

    pub fn with_opts(initial: T, opts: HistoryOpts) -> Self {
        Self {
            past: Vec::new(),
            present: initial,
            future: Vec::new(),
            opts,
            last_commit: None,
        }
    }

    pub fn present(&self) -> &T {
        &self.present
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of undoable entries.
    pub fn history_len(&self) -> usize {
        self.past.len()
    }

    /// Commit a new state, stamping the wall clock.
    pub fn set_state(&mut self, next: T) {
        self.set_state_at(next, Instant::now());
    }

    /// Compute-then-commit: clone the present, let the updater mutate the
    /// clone, commit the result. Equality suppression still applies, so an
    /// updater that changes nothing leaves the history untouched.
    pub fn set_state_with(&mut self, updater: impl FnOnce(&mut T)) {
        let mut next = self.present.clone();
        updater(&mut next);
        self.set_state(next);
    }

    /// Clock-injected commit. A candidate equal to the present is discarded
    /// entirely: no entry, no future-clear, no anchor movement.
    pub fn set_state_at(&mut self, next: T, now: Instant) {
        if next == self.present {
            return;
        }

        let coalesce = self.can_undo()
            && self
                .last_commit
                .is_some_and(|anchor| now.duration_since(anchor) < self.opts.debounce);

        if coalesce {
            // Replace in place; the anchor stays put so the burst keeps
            // folding until a real gap occurs.
            self.present = next;
            self.future.clear();
            tracing::trace!("history commit coalesced into present");
            return;
        }

        self.past.push(std::mem::replace(&mut self.present, next));
        if self.past.len() > self.opts.max_entries {
            self.past.remove(0);
        }
        self.future.clear();
        self.last_commit = Some(now);
        tracing::debug!(depth = self.past.len(), "history commit");
    }

    /// Step back one entry. No-op when the past is empty.
    pub fn undo(&mut self) -> bool {
        match self.past.pop() {
            Some(prev) => {
                let current = std::mem::replace(&mut self.present, prev);
                self.future.push(current);
                tracing::debug!(depth = self.past.len(), "undo");
                true
            }
            None => false,
        }
    }

    /// Step forward one entry. No-op when the future is empty.
    pub fn redo(&mut self) -> bool {
        match self.future.pop() {
            Some(next) => {
                let current = std::mem::replace(&mut self.present, next);
                self.past.push(current);
                tracing::debug!(depth = self.past.len(), "redo");
                true
            }
            None => false,
        }
    }

    /// Drop everything and restart from a fresh initial state.
    pub fn reset(&mut self, initial: T) {
        self.past.clear();
        self.future.clear();
        self.present = initial;
        self.last_commit = None;
    }
}
