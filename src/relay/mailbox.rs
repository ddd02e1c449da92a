//! Single-slot latest-value mailbox

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// One-element handoff where publishing overwrites any unread value.
///
/// The lock is held only for the swap, so publishers never wait on readers
/// for longer than a pointer exchange.
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    published: AtomicU64,
    overwritten: AtomicU64,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            published: AtomicU64::new(0),
            overwritten: AtomicU64::new(0),
        }
    }

    /// Store `value`. Returns true when an unread value was replaced.
    pub fn publish(&self, value: T) -> bool {
        let previous = self.slot.lock().replace(value);
        self.published.fetch_add(1, Ordering::Relaxed);
        if previous.is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Take the newest value, leaving the slot empty
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn has_value(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Discard any unread value
    pub fn clear(&self) {
        self.slot.lock().take();
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Values replaced before anyone read them
    pub fn overwritten_count(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_latest_value_wins() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.publish(1));
        assert!(mailbox.publish(2));
        assert!(mailbox.publish(3));

        assert_eq!(mailbox.take(), Some(3));
        assert_eq!(mailbox.take(), None);
        assert_eq!(mailbox.published_count(), 3);
        assert_eq!(mailbox.overwritten_count(), 2);
    }

    #[test]
    fn test_clear() {
        let mailbox = Mailbox::new();
        mailbox.publish("stale");
        mailbox.clear();
        assert!(!mailbox.has_value());
    }

    #[test]
    fn test_concurrent_publish_sees_final_value() {
        let mailbox = Arc::new(Mailbox::new());
        let producer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    mailbox.publish(i);
                }
            })
        };

        let mut last_seen = None;
        while !producer.is_finished() {
            if let Some(v) = mailbox.take() {
                if let Some(prev) = last_seen {
                    assert!(v > prev, "values must only move forward");
                }
                last_seen = Some(v);
            }
        }
        producer.join().unwrap();

        if let Some(v) = mailbox.take() {
            last_seen = Some(v);
        }
        assert_eq!(last_seen, Some(9_999));
    }
}
