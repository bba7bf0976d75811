//! Ordered buffer of events awaiting delivery
//!
//! The buffer itself is not synchronized. It lives inside the collector's
//! shared state, so every operation runs under the one lock that also
//! guards the delivery flags.

use std::collections::VecDeque;

use super::event::RequestEvent;

/// FIFO of buffered events: appended at the tail, drained from the head
#[derive(Debug, Clone)]
pub struct EventBuffer<T = RequestEvent> {
    events: VecDeque<T>,
}

impl<T> Default for EventBuffer<T> {
    fn default() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }
}

impl<T> EventBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event at the tail
    pub fn append(&mut self, event: T) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Discard the first `n` events, or all of them if fewer are buffered
    pub fn drain(&mut self, n: usize) {
        let n = n.min(self.events.len());
        self.events.drain(..n);
    }
}

impl<T: Clone> EventBuffer<T> {
    /// Copy of the current contents, in order
    pub fn snapshot(&self) -> Vec<T> {
        self.events.iter().cloned().collect()
    }
}

impl<T> FromIterator<T> for EventBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}
