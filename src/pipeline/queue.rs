//! Bounded single-producer/single-consumer queues with drop-newest backpressure

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::utils::CachePadded;
use flume::{RecvTimeoutError, SendTimeoutError, TryRecvError, TrySendError};
use tracing::trace;

/// Result of a push attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Queue stayed full for the whole timeout; the item was discarded
    Dropped,
    /// Consumer is gone
    Closed,
}

/// Result of a pop attempt
#[derive(Debug)]
pub enum Pop<T> {
    Item(T),
    Empty,
    /// Producer is gone and nothing is left to drain
    Closed,
}

/// Queue counters, shared by both halves
#[derive(Default)]
pub struct QueueStats {
    pushed: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub pushed: u64,
    pub popped: u64,
    pub dropped: u64,
}

impl QueueStats {
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

pub struct QueueProducer<T> {
    tx: flume::Sender<T>,
    stats: Arc<CachePadded<QueueStats>>,
    name: &'static str,
}

pub struct QueueConsumer<T> {
    rx: flume::Receiver<T>,
    stats: Arc<CachePadded<QueueStats>>,
    name: &'static str,
}

/// Create a named queue holding at most `capacity` items
pub fn bounded<T>(name: &'static str, capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let (tx, rx) = flume::bounded(capacity.max(1));
    let stats = Arc::new(CachePadded::new(QueueStats::default()));
    (
        QueueProducer {
            tx,
            stats: stats.clone(),
            name,
        },
        QueueConsumer { rx, stats, name },
    )
}

impl<T> QueueProducer<T> {
    /// Blocking push that gives up after `timeout`, dropping `item`
    pub fn push_timeout(&self, item: T, timeout: Duration) -> PushOutcome {
        match self.tx.send_timeout(item, timeout) {
            Ok(()) => self.enqueued(),
            Err(SendTimeoutError::Timeout(_)) => self.dropped(),
            Err(SendTimeoutError::Disconnected(_)) => PushOutcome::Closed,
        }
    }

    /// Async push that gives up after `timeout`, dropping `item`
    pub async fn push_timeout_async(&self, item: T, timeout: Duration) -> PushOutcome {
        let item = match self.tx.try_send(item) {
            Ok(()) => return self.enqueued(),
            Err(TrySendError::Disconnected(_)) => return PushOutcome::Closed,
            Err(TrySendError::Full(item)) => item,
        };

        match tokio::time::timeout(timeout, self.tx.send_async(item)).await {
            Ok(Ok(())) => self.enqueued(),
            Ok(Err(_)) => PushOutcome::Closed,
            Err(_) => self.dropped(),
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }

    pub fn stats(&self) -> Arc<CachePadded<QueueStats>> {
        self.stats.clone()
    }

    fn enqueued(&self) -> PushOutcome {
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        PushOutcome::Enqueued
    }

    fn dropped(&self) -> PushOutcome {
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("frames_dropped_total", "queue" => self.name).increment(1);
        trace!("{} queue full, item dropped", self.name);
        PushOutcome::Dropped
    }
}

impl<T> QueueConsumer<T> {
    /// Blocking pop, waiting at most `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Pop<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => self.popped(item),
            Err(RecvTimeoutError::Timeout) => Pop::Empty,
            Err(RecvTimeoutError::Disconnected) => Pop::Closed,
        }
    }

    /// Async pop, waiting at most `timeout`
    pub async fn pop_timeout_async(&self, timeout: Duration) -> Pop<T> {
        match tokio::time::timeout(timeout, self.rx.recv_async()).await {
            Ok(Ok(item)) => self.popped(item),
            Ok(Err(_)) => Pop::Closed,
            Err(_) => Pop::Empty,
        }
    }

    pub fn try_pop(&self) -> Pop<T> {
        match self.rx.try_recv() {
            Ok(item) => self.popped(item),
            Err(TryRecvError::Empty) => Pop::Empty,
            Err(TryRecvError::Disconnected) => Pop::Closed,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> Arc<CachePadded<QueueStats>> {
        self.stats.clone()
    }

    fn popped(&self, item: T) -> Pop<T> {
        self.stats.popped.fetch_add(1, Ordering::Relaxed);
        Pop::Item(item)
    }
}
