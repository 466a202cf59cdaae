//! Multi-producer event queue and the push capability handed to producers.

use crate::event::Event;
use crossbeam::queue::SegQueue;
use std::fmt;
use std::sync::Arc;

/// Unbounded FIFO of events.
///
/// Any number of threads may push through a [`Pusher`]; only the dispatch
/// loop pops.
#[derive(Clone, Default)]
pub struct EventQueue {
    inner: Arc<SegQueue<Event>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.inner.push(event);
    }

    pub fn pop(&self) -> Option<Event> {
        self.inner.pop()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an enqueue-only handle to this queue.
    pub fn pusher(&self) -> Pusher {
        Pusher {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.inner.len())
            .finish()
    }
}

/// Enqueue-only handle given to handlers, I/O workers and event sources.
#[derive(Clone)]
pub struct Pusher {
    inner: Arc<SegQueue<Event>>,
}

impl Pusher {
    pub fn push(&self, event: Event) {
        self.inner.push(event);
    }
}

impl fmt::Debug for Pusher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pusher")
            .field("queued", &self.inner.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = EventQueue::new();
        let pusher = queue.pusher();

        pusher.push(Event::Read { id: 1 });
        pusher.push(Event::Close { id: 2 });

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().map(|e| e.id()), Some(1));
        assert_eq!(queue.pop().map(|e| e.id()), Some(2));
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = EventQueue::new();

        let producers: Vec<_> = (0..4)
            .map(|t| {
                let pusher = queue.pusher();
                thread::spawn(move || {
                    for i in 0..250 {
                        pusher.push(Event::Read { id: t * 1000 + i });
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }

        let mut seen = 0;
        while queue.pop().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 1000);
    }
}
