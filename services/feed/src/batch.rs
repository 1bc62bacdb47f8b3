//! Tick batching for durable writes
//!
//! Flush when the batch reaches the size threshold OR the wall-clock
//! interval elapses, whichever first: the threshold bounds memory, the
//! interval bounds how stale durable storage can get under light flow.
//! A failed batch is requeued at the FRONT so journal order matches
//! arrival order across retries.

use std::collections::VecDeque;

use types::trade::TradeTick;

/// Default flush threshold (ticks per batch).
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Ordered buffer of ticks awaiting a durable write.
#[derive(Debug)]
pub struct TickBatcher {
    pending: VecDeque<TradeTick>,
    batch_size: usize,
}

impl TickBatcher {
    pub fn new(batch_size: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(batch_size),
            batch_size: batch_size.max(1),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }

    /// Buffer one tick; returns the drained batch when the size threshold
    /// is reached.
    pub fn push(&mut self, tick: TradeTick) -> Option<Vec<TradeTick>> {
        self.pending.push_back(tick);
        if self.pending.len() >= self.batch_size {
            Some(self.drain())
        } else {
            None
        }
    }

    /// Take everything pending (interval flush).
    pub fn drain(&mut self) -> Vec<TradeTick> {
        self.pending.drain(..).collect()
    }

    /// Reinsert a failed batch ahead of anything buffered since, preserving
    /// arrival order.
    pub fn requeue(&mut self, batch: Vec<TradeTick>) {
        for tick in batch.into_iter().rev() {
            self.pending.push_front(tick);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
