use alloc::boxed::Box;
use alloc::collections::VecDeque;

use crate::sync::spin::SpinLock;

/// One of these lives per base device. On `-ENOMEM` from a base submit,
/// the core registers the request with the base device's wait queue using
/// a single embedded entry; when signalled, it retries from the saved
/// `submitted` cursor. Each pending I/O contributes at most one entry —
/// the per-I/O context owns the retry closure's capture, not this queue.
pub struct WaitQueue {
    entries: SpinLock<VecDeque<Box<dyn FnOnce() + Send>>>,
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitQueue {
    pub const fn new() -> Self {
        WaitQueue {
            entries: SpinLock::new(VecDeque::new()),
        }
    }

    /// Queues a retry to run the next time [`WaitQueue::drain`] is called.
    pub fn push(&self, retry: impl FnOnce() + Send + 'static) {
        self.entries.lock().push_back(Box::new(retry));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Runs every queued retry in FIFO order, the way the host framework
    /// drains a device's wait queue once resources free up. Retries queued
    /// by a retry running during this drain are not run until the next
    /// call.
    pub fn drain(&self) {
        let pending: VecDeque<_> = core::mem::take(&mut *self.entries.lock());
        for retry in pending {
            retry();
        }
    }
}
