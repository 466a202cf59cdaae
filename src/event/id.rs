use crate::event::RequestId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out unique, increasing request identifiers. Safe to share.
#[derive(Debug, Default)]
pub struct IdIssuer {
    next: AtomicU64,
}

impl IdIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RequestId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequential_ids() {
        let issuer = IdIssuer::new();
        assert_eq!(issuer.issue(), 0);
        assert_eq!(issuer.issue(), 1);
        assert_eq!(issuer.issue(), 2);
    }

    #[test]
    fn test_unique_across_threads() {
        let issuer = Arc::new(IdIssuer::new());

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let issuer = Arc::clone(&issuer);
                thread::spawn(move || (0..100).map(|_| issuer.issue()).collect::<Vec<_>>())
            })
            .collect();

        let mut ids = HashSet::new();
        for worker in workers {
            for id in worker.join().unwrap() {
                assert!(ids.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(ids.len(), 800);
    }
}
