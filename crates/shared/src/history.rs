use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Bounded linear undo log. Only manages entries; callers apply them.
#[derive(Debug, Clone)]
pub struct History<E> {
    past: VecDeque<E>,
    future: Vec<E>,
    capacity: usize,
}

impl<E: Clone> Default for History<E> {
    fn default() -> Self {
        History::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl<E: Clone> History<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        History {
            past: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            future: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a new entry. Drops the oldest beyond capacity and invalidates redo.
    pub fn push(&mut self, entry: E) {
        if self.past.len() == self.capacity {
            self.past.pop_front();
        }
        self.past.push_back(entry);
        self.future.clear();
    }

    /// Move the latest entry to the redo stack and hand it back for reversal.
    pub fn undo(&mut self) -> Option<E> {
        let entry = self.past.pop_back()?;
        self.future.push(entry.clone());
        Some(entry)
    }

    pub fn redo(&mut self) -> Option<E> {
        let entry = self.future.pop()?;
        self.past.push_back(entry.clone());
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.past.len()
    }

    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    pub fn reset(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
