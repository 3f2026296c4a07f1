//! Events for the presentation state machine
//!
//! The driver never calls back into the state machine. It queues events and
//! the caller drains the queue once the current call has returned, so a state
//! transition triggered by an event never runs on top of the driver's stack.

use std::collections::VecDeque;

/// Event signalled to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Reading finished (or a PIN operation succeeded); move to the next state
    ReadReady,
}

/// FIFO of pending events
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event
    pub fn push(&mut self, event: Event) {
        self.pending.push_back(event);
    }

    /// Take the oldest pending event
    pub fn pop(&mut self) -> Option<Event> {
        self.pending.pop_front()
    }

    /// Take every pending event, oldest first
    pub fn drain(&mut self) -> Vec<Event> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = EventQueue::new();
        queue.push(Event::ReadReady);
        queue.push(Event::ReadReady);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(Event::ReadReady));
        assert_eq!(queue.drain(), vec![Event::ReadReady]);
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }
}
