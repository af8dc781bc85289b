//! # Broadcast
//!
//! Single-producer, multi-subscriber ordered event distribution.
//!
//! ## Philosophy
//!
//! - **Subscribe from now**: a subscriber observes every item published after
//!   its `subscribe` call, in publication order, and nothing before
//! - **Independent consumers**: subscribers advance at their own pace and
//!   never interfere with each other
//! - **Producers never wait**: publishing does not block on slow consumers
//! - **Explicit end**: closing the channel ends every subscriber's sequence
//!   after it drains what was already published
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A request/reply channel (no backpressure, no acknowledgement)
//! - A replay log (subscribers cannot rewind)
//! - An async runtime (consumers block on a condvar, no executor required)

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Shared channel state
struct State<T> {
    /// Retained items, oldest first
    items: VecDeque<T>,
    /// Sequence number of `items.front()`
    head: u64,
    /// Next subscriber id
    next_subscriber: u64,
    /// Subscriber id -> next sequence number to deliver
    cursors: HashMap<u64, u64>,
    /// No further items will be published
    closed: bool,
}

impl<T> State<T> {
    /// Sequence number one past the newest published item
    fn tail(&self) -> u64 {
        self.head + self.items.len() as u64
    }

    /// Drops items every live subscriber has consumed
    fn collect(&mut self) {
        let tail = self.tail();
        let min = self.cursors.values().min().copied().unwrap_or(tail);
        while self.head < min {
            self.items.pop_front();
            self.head += 1;
        }
    }
}

struct Shared<T> {
    state: Mutex<State<T>>,
    available: Condvar,
    producers: AtomicUsize,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.available.notify_all();
    }
}

/// Producer end and subscription factory of a broadcast channel
///
/// Cloning shares the same channel; the channel closes when the last clone
/// is dropped or when [`Broadcast::close`] is called explicitly.
pub struct Broadcast<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Broadcast<T> {
    /// Creates a new, open channel with no subscribers
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    head: 0,
                    next_subscriber: 0,
                    cursors: HashMap::new(),
                    closed: false,
                }),
                available: Condvar::new(),
                producers: AtomicUsize::new(1),
            }),
        }
    }

    /// Publishes an item to every current subscriber
    ///
    /// Items published while no subscriber is live are dropped; publishing
    /// after close is a no-op.
    pub fn publish(&self, item: T) {
        let mut state = self.shared.lock();
        if state.closed {
            return;
        }
        state.items.push_back(item);
        state.collect();
        drop(state);
        self.shared.available.notify_all();
    }

    /// Creates a subscriber positioned at "now"
    ///
    /// The subscriber will observe every item published after this call and
    /// nothing published before. Subscribing to a closed channel yields an
    /// immediately-ended sequence.
    pub fn subscribe(&self) -> Subscriber<T> {
        let mut state = self.shared.lock();
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        let cursor = state.tail();
        state.cursors.insert(id, cursor);
        Subscriber {
            shared: Arc::clone(&self.shared),
            id,
        }
    }

    /// Closes the channel
    ///
    /// Subscribers drain what was already published, then their sequences
    /// end. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Returns true once the channel is closed
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().cursors.len()
    }

    /// Number of items retained for subscribers that have not consumed them
    pub fn retained_len(&self) -> usize {
        self.shared.lock().items.len()
    }
}

impl<T> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        self.shared.producers.fetch_add(1, Ordering::Relaxed);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for Broadcast<T> {
    fn drop(&mut self) {
        if self.shared.producers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.close();
        }
    }
}

/// Consumer cursor into a broadcast channel
///
/// Dropping a subscriber releases its cursor, so an abandoned consumer never
/// pins retained items.
pub struct Subscriber<T> {
    shared: Arc<Shared<T>>,
    id: u64,
}

impl<T: Clone> Subscriber<T> {
    /// Blocks until the next item is available or the channel ends
    ///
    /// Returns `None` once the channel is closed and this subscriber has
    /// drained everything published before the close.
    pub fn next(&mut self) -> Option<T> {
        let mut state = self.shared.lock();
        loop {
            if let Some(item) = Self::take(&mut state, self.id) {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .shared
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Returns the next item if one is already available
    ///
    /// `None` means "nothing pending right now" on an open channel and
    /// "sequence ended" on a closed one; use [`Subscriber::next`] when the
    /// distinction matters.
    pub fn try_next(&mut self) -> Option<T> {
        let mut state = self.shared.lock();
        Self::take(&mut state, self.id)
    }

    fn take(state: &mut State<T>, id: u64) -> Option<T> {
        let cursor = *state.cursors.get(&id)?;
        if cursor >= state.tail() {
            return None;
        }
        let index = (cursor - state.head) as usize;
        let item = state.items[index].clone();
        state.cursors.insert(id, cursor + 1);
        state.collect();
        Some(item)
    }
}

impl<T> Drop for Subscriber<T> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.cursors.remove(&self.id);
        state.collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fan_out_identical_sequences() {
        let channel = Broadcast::new();
        let mut first = channel.subscribe();
        let mut second = channel.subscribe();

        channel.publish("a");
        channel.publish("b");
        channel.publish("c");

        assert_eq!(first.try_next(), Some("a"));
        assert_eq!(first.try_next(), Some("b"));
        assert_eq!(first.try_next(), Some("c"));
        assert_eq!(second.try_next(), Some("a"));
        assert_eq!(second.try_next(), Some("b"));
        assert_eq!(second.try_next(), Some("c"));
    }

    #[test]
    fn test_late_subscriber_sees_only_later_items() {
        let channel = Broadcast::new();
        let mut early = channel.subscribe();

        channel.publish(1);
        channel.publish(2);
        let mut late = channel.subscribe();
        channel.publish(3);

        assert_eq!(early.try_next(), Some(1));
        assert_eq!(early.try_next(), Some(2));
        assert_eq!(early.try_next(), Some(3));
        assert_eq!(late.try_next(), Some(3));
        assert_eq!(late.try_next(), None);
    }

    #[test]
    fn test_next_blocks_until_publish() {
        let channel = Broadcast::new();
        let mut subscriber = channel.subscribe();

        let consumer = thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(item) = subscriber.next() {
                seen.push(item);
            }
            seen
        });

        thread::sleep(Duration::from_millis(20));
        channel.publish(10);
        channel.publish(20);
        channel.close();

        assert_eq!(consumer.join().unwrap(), vec![10, 20]);
    }

    #[test]
    fn test_close_drains_then_ends() {
        let channel = Broadcast::new();
        let mut subscriber = channel.subscribe();

        channel.publish("x");
        channel.publish("y");
        channel.close();

        assert_eq!(subscriber.next(), Some("x"));
        assert_eq!(subscriber.next(), Some("y"));
        assert_eq!(subscriber.next(), None);
    }

    #[test]
    fn test_subscribe_after_close_ends_immediately() {
        let channel: Broadcast<u8> = Broadcast::new();
        channel.close();
        let mut subscriber = channel.subscribe();
        assert_eq!(subscriber.next(), None);
    }

    #[test]
    fn test_publish_after_close_is_dropped() {
        let channel = Broadcast::new();
        let mut subscriber = channel.subscribe();
        channel.close();
        channel.publish(7);
        assert_eq!(subscriber.next(), None);
    }

    #[test]
    fn test_no_subscriber_retains_nothing() {
        let channel = Broadcast::new();
        channel.publish(1);
        channel.publish(2);
        assert_eq!(channel.retained_len(), 0);
    }

    #[test]
    fn test_slow_subscriber_pins_retention_until_dropped() {
        let channel = Broadcast::new();
        let mut fast = channel.subscribe();
        let slow = channel.subscribe();

        channel.publish(1);
        channel.publish(2);
        channel.publish(3);

        assert_eq!(fast.try_next(), Some(1));
        assert_eq!(fast.try_next(), Some(2));
        assert_eq!(fast.try_next(), Some(3));
        assert_eq!(channel.retained_len(), 3);

        drop(slow);
        assert_eq!(channel.retained_len(), 0);
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn test_dropping_last_producer_closes_channel() {
        let channel = Broadcast::new();
        let mut subscriber = channel.subscribe();
        channel.publish(5);
        drop(channel);
        assert_eq!(subscriber.next(), Some(5));
        assert_eq!(subscriber.next(), None);
    }

    #[test]
    fn test_cloned_producer_keeps_channel_open() {
        let channel = Broadcast::new();
        let second = channel.clone();
        let mut subscriber = channel.subscribe();
        drop(channel);
        assert!(!second.is_closed());
        second.publish(9);
        assert_eq!(subscriber.try_next(), Some(9));
    }

    #[test]
    fn test_cross_thread_publication_order() {
        let channel = Broadcast::new();
        let mut subscriber = channel.subscribe();

        let producer = thread::spawn(move || {
            for i in 0..100 {
                channel.publish(i);
            }
            // channel drop closes
        });

        let mut seen = Vec::new();
        while let Some(item) = subscriber.next() {
            seen.push(item);
        }
        producer.join().unwrap();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
