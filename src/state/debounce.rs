use std::time::Duration;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::time::Instant;

use crate::dao::models::Topic;

/// Leading-edge guard against repeat sends: the first send from an author on a
/// topic opens a fixed window, and every further send inside it is rejected.
pub struct Debouncer {
    window: Duration,
    last_accepted: DashMap<(String, Topic), Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: DashMap::new(),
        }
    }

    /// Returns `true` when the send should go through, recording it as the new
    /// window start.
    pub fn try_accept(&self, author: &str, topic: Topic) -> bool {
        if self.window.is_zero() {
            return true;
        }

        let now = Instant::now();
        match self.last_accepted.entry((author.to_owned(), topic)) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.window {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Forget a previously accepted send so the author may retry immediately.
    pub fn release(&self, author: &str, topic: Topic) {
        self.last_accepted.remove(&(author.to_owned(), topic));
    }

    /// Drop entries whose window has closed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.last_accepted
            .retain(|_, accepted| now.duration_since(*accepted) < self.window);
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeats_inside_the_window_are_rejected() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        assert!(debouncer.try_accept("alice", Topic::Global));
        assert!(!debouncer.try_accept("alice", Topic::Global));

        tokio::time::advance(Duration::from_millis(299)).await;
        assert!(!debouncer.try_accept("alice", Topic::Global));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(debouncer.try_accept("alice", Topic::Global));
    }

    #[tokio::test(start_paused = true)]
    async fn windows_are_per_author_and_topic() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let game = Topic::Game(Uuid::new_v4());
        assert!(debouncer.try_accept("alice", Topic::Global));
        assert!(debouncer.try_accept("bob", Topic::Global));
        assert!(debouncer.try_accept("alice", game));
    }

    #[tokio::test(start_paused = true)]
    async fn release_and_purge_reopen_the_window() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        assert!(debouncer.try_accept("alice", Topic::Global));
        debouncer.release("alice", Topic::Global);
        assert!(debouncer.try_accept("alice", Topic::Global));

        tokio::time::advance(Duration::from_millis(300)).await;
        debouncer.purge_expired();
        assert!(debouncer.last_accepted.is_empty());
    }

    #[test]
    fn zero_window_accepts_everything() {
        let debouncer = Debouncer::new(Duration::ZERO);
        assert!(debouncer.try_accept("alice", Topic::Global));
        assert!(debouncer.try_accept("alice", Topic::Global));
    }
}
