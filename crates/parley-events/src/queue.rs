//! FIFO buffer between the bus delivery path and the application.

use std::collections::VecDeque;

use crate::Event;

/// Queue length at which [`EventQueue`] logs a warning by default.
pub const DEFAULT_WARN_THRESHOLD: usize = 1024;

/// Ordered, unbounded buffer of [`Event`]s.
///
/// Events come out in exactly the order they were pushed. Nothing is ever
/// dropped: an application that never polls grows this queue without
/// limit. To make that visible, the queue logs a single `warn!` when its
/// length first reaches the warn threshold, and re-arms once it has been
/// drained back below it.
///
/// ```
/// use parley_events::{ErrorKind, Event, EventQueue};
///
/// let mut queue = EventQueue::new();
/// queue.push(Event::error(ErrorKind::NotFound, "first"));
/// queue.push(Event::error(ErrorKind::NotFound, "second"));
///
/// assert_eq!(queue.count(), 2);
/// let all = queue.poll_all();
/// assert_eq!(all.len(), 2);
/// assert!(!queue.has_events());
/// ```
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<Event>,
    warn_threshold: usize,
    warned: bool,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    /// Empty queue with [`DEFAULT_WARN_THRESHOLD`].
    pub fn new() -> Self {
        Self::with_warn_threshold(DEFAULT_WARN_THRESHOLD)
    }

    /// Empty queue that warns at `threshold` pending events. `0` disables
    /// the warning.
    pub fn with_warn_threshold(threshold: usize) -> Self {
        Self {
            events: VecDeque::new(),
            warn_threshold: threshold,
            warned: false,
        }
    }

    /// Appends an event at the tail.
    pub fn push(&mut self, event: Event) {
        tracing::trace!(event = event.type_name(), "event queued");
        self.events.push_back(event);

        if self.warn_threshold > 0
            && !self.warned
            && self.events.len() >= self.warn_threshold
        {
            self.warned = true;
            tracing::warn!(
                pending = self.events.len(),
                threshold = self.warn_threshold,
                "event queue is growing; is the application polling?"
            );
        }
    }

    /// Removes and returns the oldest event, or `None` if empty.
    pub fn poll_one(&mut self) -> Option<Event> {
        let event = self.events.pop_front();
        self.rearm();
        event
    }

    /// Removes and returns every pending event, oldest first.
    pub fn poll_all(&mut self) -> Vec<Event> {
        let drained: Vec<Event> = self.events.drain(..).collect();
        self.rearm();
        drained
    }

    /// Number of pending events.
    pub fn count(&self) -> usize {
        self.events.len()
    }

    /// Alias of [`EventQueue::count`].
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns `true` if at least one event is pending.
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Peeks at the pending events without removing them.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    fn rearm(&mut self) {
        if self.warned && self.events.len() < self.warn_threshold {
            self.warned = false;
        }
    }
}

impl Extend<Event> for EventQueue {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        for event in iter {
            self.push(event);
        }
    }
}
