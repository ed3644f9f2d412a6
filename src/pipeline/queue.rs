// SPDX-License-Identifier: GPL-3.0-only

//! Bounded, closable FIFO queue connecting pipeline stages
//!
//! Producers in the pipeline use [`BoundedClosableQueue::try_put`], which
//! rejects the *new* item when the queue is full. Nothing ever blocks or
//! evicts older entries to make room, so a slow consumer sees stale-but-live
//! data and producers keep running.
//!
//! Closing enqueues a single [`Slot::Closed`] marker. Iteration ends as soon
//! as that marker is drawn, after every earlier item has been yielded.
//!
//! # Single consumer
//!
//! Only one marker is ever enqueued, so only the consumer that draws it sees
//! the close. A queue drained by several consumers leaves the others blocked
//! in [`BoundedClosableQueue::get`] forever. Queues are therefore meant to
//! have exactly one consumer.

use crate::config::QueueCapacity;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::time::Duration;

/// Entry stored in the channel: an item or the close marker
#[derive(Debug)]
pub enum Slot<T> {
    Item(T),
    Closed,
}

/// Why a non-blocking or timed `get` returned no item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryGetError {
    /// Nothing pending
    Empty,
    /// Timed wait elapsed with nothing pending
    Timeout,
    /// The close marker was drawn (and consumed)
    Closed,
}

/// Fixed-capacity (or unbounded) FIFO with a one-shot close marker
///
/// Cloning produces another handle to the same queue.
#[derive(Debug)]
pub struct BoundedClosableQueue<T> {
    capacity: QueueCapacity,
    tx: Sender<Slot<T>>,
    rx: Receiver<Slot<T>>,
}

impl<T> Clone for BoundedClosableQueue<T> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> BoundedClosableQueue<T> {
    /// Create a queue with the given capacity policy.
    ///
    /// A bounded capacity of zero is bumped to one; a zero-capacity queue
    /// could never accept a `try_put`. [`crate::config::Config::validate`]
    /// rejects it before it gets here.
    pub fn new(capacity: QueueCapacity) -> Self {
        let (tx, rx) = match capacity {
            QueueCapacity::Bounded(n) => crossbeam_channel::bounded(n.max(1)),
            QueueCapacity::Unbounded => crossbeam_channel::unbounded(),
        };
        let capacity = match capacity {
            QueueCapacity::Bounded(n) => QueueCapacity::Bounded(n.max(1)),
            QueueCapacity::Unbounded => QueueCapacity::Unbounded,
        };
        Self { capacity, tx, rx }
    }

    /// Shorthand for a bounded queue
    pub fn bounded(capacity: usize) -> Self {
        Self::new(QueueCapacity::Bounded(capacity))
    }

    /// Shorthand for an unbounded queue
    pub fn unbounded() -> Self {
        Self::new(QueueCapacity::Unbounded)
    }

    pub fn capacity(&self) -> QueueCapacity {
        self.capacity
    }

    /// Number of pending entries, including an unread close marker
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Insert without blocking.
    ///
    /// When the queue is full the item is handed back and the queue is left
    /// unchanged.
    pub fn try_put(&self, item: T) -> Result<(), T> {
        match self.tx.try_send(Slot::Item(item)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(slot)) | Err(TrySendError::Disconnected(slot)) => {
                match slot {
                    Slot::Item(item) => Err(item),
                    Slot::Closed => unreachable!("try_put only sends items"),
                }
            }
        }
    }

    /// Insert, waiting while the queue is full
    pub fn put(&self, item: T) {
        // The queue owns a receiver, so the channel cannot disconnect
        let _ = self.tx.send(Slot::Item(item));
    }

    /// Remove the oldest entry, blocking while empty.
    ///
    /// Returns `None` when the close marker is drawn.
    pub fn get(&self) -> Option<T> {
        match self.rx.recv() {
            Ok(Slot::Item(item)) => Some(item),
            Ok(Slot::Closed) | Err(_) => None,
        }
    }

    /// Remove the oldest entry if one is pending
    pub fn try_get(&self) -> Result<T, TryGetError> {
        match self.rx.try_recv() {
            Ok(Slot::Item(item)) => Ok(item),
            Ok(Slot::Closed) | Err(TryRecvError::Disconnected) => Err(TryGetError::Closed),
            Err(TryRecvError::Empty) => Err(TryGetError::Empty),
        }
    }

    /// Remove the oldest entry, waiting at most `timeout`
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, TryGetError> {
        match self.rx.recv_timeout(timeout) {
            Ok(Slot::Item(item)) => Ok(item),
            Ok(Slot::Closed) | Err(RecvTimeoutError::Disconnected) => Err(TryGetError::Closed),
            Err(RecvTimeoutError::Timeout) => Err(TryGetError::Timeout),
        }
    }

    /// Enqueue the close marker, waiting for room if the queue is full.
    ///
    /// Call at most once per queue; a second marker would end a second
    /// iteration.
    pub fn close(&self) {
        let _ = self.tx.send(Slot::Closed);
    }

    /// Lazily drain the queue until the close marker is drawn
    pub fn iter(&self) -> QueueIter<'_, T> {
        QueueIter { queue: self }
    }

    /// Underlying receiver, for multiplexed waits with `crossbeam_channel::Select`
    pub(crate) fn receiver(&self) -> &Receiver<Slot<T>> {
        &self.rx
    }
}

/// Iterator returned by [`BoundedClosableQueue::iter`]
pub struct QueueIter<'a, T> {
    queue: &'a BoundedClosableQueue<T>,
}

impl<T> Iterator for QueueIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.get()
    }
}

impl<'a, T> IntoIterator for &'a BoundedClosableQueue<T> {
    type Item = T;
    type IntoIter = QueueIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
