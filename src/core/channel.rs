// src/core/channel.rs
//
// Bounded, ordered handoff of spectrogram columns from the producer thread
// to the consumer. Built on crossbeam's bounded channel; the producer also
// keeps a receiver handle so it can evict (drop-oldest policy) or discard
// (cancellation) buffered columns.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::dsp::SpectrogramColumn;
use crate::config::Backpressure;

/// Slice a blocking put waits before re-checking cancellation
const PUT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Cooperative cancellation flag shared by a session and its producer
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Why a `put` did not deliver its column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutError {
    /// Cancellation was requested while waiting for space
    Cancelled,
    /// The consumer side is gone
    Disconnected,
}

/// Why `try_take` returned nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeError {
    /// Nothing buffered right now
    Empty,
    /// Closed and fully drained
    Closed,
}

#[derive(Debug, Default)]
struct ChannelStats {
    high_water: AtomicUsize,
    dropped: AtomicU64,
    published: AtomicU64,
    closed: AtomicBool,
}

/// Create a result channel with fixed capacity and backpressure policy
pub fn result_channel(
    capacity: usize,
    policy: Backpressure,
    cancel: CancellationToken,
) -> (ColumnSender, ColumnReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = bounded(capacity);
    let stats = Arc::new(ChannelStats::default());

    let sender = ColumnSender {
        tx: Some(tx),
        evict: rx.clone(),
        policy,
        cancel,
        capacity,
        stats: stats.clone(),
    };
    let receiver = ColumnReceiver {
        rx,
        capacity,
        stats,
    };
    (sender, receiver)
}

/// Producer end. Dropping it closes the channel.
pub struct ColumnSender {
    tx: Option<Sender<SpectrogramColumn>>,
    evict: Receiver<SpectrogramColumn>,
    policy: Backpressure,
    cancel: CancellationToken,
    capacity: usize,
    stats: Arc<ChannelStats>,
}

impl ColumnSender {
    /// Publish one column, applying the backpressure policy when full
    pub fn put(&self, column: SpectrogramColumn) -> Result<(), PutError> {
        let tx = self.tx.as_ref().ok_or(PutError::Disconnected)?;
        if self.cancel.is_cancelled() {
            return Err(PutError::Cancelled);
        }

        match self.policy {
            Backpressure::Block => {
                let mut column = column;
                loop {
                    match tx.send_timeout(column, PUT_POLL_INTERVAL) {
                        Ok(()) => break,
                        Err(SendTimeoutError::Timeout(back)) => {
                            if self.cancel.is_cancelled() {
                                return Err(PutError::Cancelled);
                            }
                            column = back;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => return Err(PutError::Disconnected),
                    }
                }
            }
            Backpressure::DropOldest => {
                let mut column = column;
                loop {
                    match tx.try_send(column) {
                        Ok(()) => break,
                        Err(TrySendError::Full(back)) => {
                            if self.evict.try_recv().is_ok() {
                                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                                log::warn!("Result channel full, dropped oldest column");
                            }
                            column = back;
                        }
                        Err(TrySendError::Disconnected(_)) => return Err(PutError::Disconnected),
                    }
                }
            }
        }

        self.stats.published.fetch_add(1, Ordering::Relaxed);
        self.stats.high_water.fetch_max(tx.len(), Ordering::Relaxed);
        Ok(())
    }

    /// Signal that no more columns will arrive. Buffered columns stay
    /// available to the consumer.
    pub fn close(self) {
        drop(self);
    }

    /// Drop every buffered column, then close
    pub fn discard(mut self) -> usize {
        self.tx.take();
        let mut discarded = 0;
        while self.evict.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for ColumnSender {
    fn drop(&mut self) {
        self.tx.take();
        self.stats.closed.store(true, Ordering::SeqCst);
    }
}

/// Consumer end
pub struct ColumnReceiver {
    rx: Receiver<SpectrogramColumn>,
    capacity: usize,
    stats: Arc<ChannelStats>,
}

impl ColumnReceiver {
    pub fn try_take(&self) -> Result<SpectrogramColumn, TakeError> {
        self.rx.try_recv().map_err(|e| match e {
            TryRecvError::Empty => TakeError::Empty,
            TryRecvError::Disconnected => TakeError::Closed,
        })
    }

    /// Wait up to `timeout` for a column
    pub fn take_timeout(&self, timeout: Duration) -> Result<SpectrogramColumn, TakeError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => TakeError::Empty,
            RecvTimeoutError::Disconnected => TakeError::Closed,
        })
    }

    /// Take up to `max` buffered columns without waiting
    pub fn drain_batch(&self, max: usize) -> Vec<SpectrogramColumn> {
        self.rx.try_iter().take(max).collect()
    }

    /// Closed with nothing left to take
    pub fn is_finished(&self) -> bool {
        self.stats.closed.load(Ordering::SeqCst) && self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most columns ever buffered at once
    pub fn high_water_mark(&self) -> usize {
        self.stats.high_water.load(Ordering::Relaxed)
    }

    /// Columns evicted by the drop-oldest policy
    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    /// Columns accepted by `put`
    pub fn published(&self) -> u64 {
        self.stats.published.load(Ordering::Relaxed)
    }

    pub(crate) fn raw(&self) -> &Receiver<SpectrogramColumn> {
        &self.rx
    }
}
