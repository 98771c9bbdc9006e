use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Bounded, time-windowed set of recently requested pack ids.
///
/// Entries expire after `window`; when `capacity` is reached the oldest entry is evicted.
#[derive(Debug)]
pub struct RecentPacks {
    window: Duration,
    capacity: usize,
    entries: VecDeque<(String, Instant)>,
}

impl RecentPacks {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Records `pack_id` and returns `true`, or returns `false` if it was seen within the window.
    pub fn check_and_insert(&mut self, pack_id: &str) -> bool {
        self.check_and_insert_at(pack_id, Instant::now())
    }

    pub fn check_and_insert_at(&mut self, pack_id: &str, now: Instant) -> bool {
        self.expire(now);
        if self.entries.iter().any(|(id, _)| id == pack_id) {
            return false;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((pack_id.to_string(), now));
        true
    }

    /// Drop `pack_id` so a failed run can be retried right away.
    pub fn forget(&mut self, pack_id: &str) {
        self.entries.retain(|(id, _)| id != pack_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn expire(&mut self, now: Instant) {
        while let Some((_, at)) = self.entries.front() {
            if now.saturating_duration_since(*at) < self.window {
                break;
            }
            self.entries.pop_front();
        }
    }
}
