//! Status event side channel
//!
//! Every dispatcher transition posts a short text event. Readers on other
//! threads see only the newest `capacity` events, newest first.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEvent {
    pub text: String,
    pub timestamp: SystemTime,
}

/// Bounded, thread-safe feed of status events; clones share the same feed
#[derive(Debug, Clone)]
pub struct StatusFeed {
    events: Arc<Mutex<VecDeque<StatusEvent>>>,
    capacity: usize,
}

impl StatusFeed {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        StatusFeed {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn events(&self) -> MutexGuard<'_, VecDeque<StatusEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn post(&self, text: impl Into<String>) {
        let event = StatusEvent {
            text: text.into(),
            timestamp: SystemTime::now(),
        };
        log::info!("[status] {}", event.text);
        let mut events = self.events();
        events.push_front(event);
        events.truncate(self.capacity);
    }

    /// Most recent event, if any
    pub fn current(&self) -> Option<StatusEvent> {
        self.events().front().cloned()
    }

    /// Retained events, newest first
    pub fn recent(&self) -> Vec<StatusEvent> {
        self.events().iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for StatusFeed {
    fn default() -> Self {
        Self::new(20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_newest_first_up_to_capacity() {
        let feed = StatusFeed::new(3);
        for i in 0..5 {
            feed.post(format!("event {}", i));
        }
        let texts: Vec<String> = feed.recent().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["event 4", "event 3", "event 2"]);
        assert_eq!(feed.current().unwrap().text, "event 4");
    }

    #[test]
    fn test_clones_share_events() {
        let feed = StatusFeed::default();
        let reader = feed.clone();
        assert!(reader.current().is_none());

        std::thread::spawn(move || feed.post("from control thread"))
            .join()
            .unwrap();
        assert_eq!(reader.recent().len(), 1);
        assert_eq!(reader.capacity(), 20);
    }

    #[test]
    fn test_zero_capacity_still_keeps_latest() {
        let feed = StatusFeed::new(0);
        feed.post("a");
        feed.post("b");
        assert_eq!(feed.recent().len(), 1);
        assert_eq!(feed.current().unwrap().text, "b");
    }
}
