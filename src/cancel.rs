//! Cooperative cancellation and the per-slot iteration bound.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Shared stop flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Never blocks.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `total`, waking every `step` to check the flag.
    ///
    /// Returns `false` if cancelled before `total` elapsed.
    pub fn sleep(&self, total: Duration, step: Duration) -> bool {
        let deadline = Instant::now() + total;
        let step = step.max(Duration::from_millis(1));
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(step.min(deadline - now));
        }
    }
}

/// Counts inner-loop iterations of one slot and trips past `limit`.
#[derive(Debug, Clone)]
pub struct SafetyCounter {
    count: u64,
    limit: u64,
}

impl SafetyCounter {
    pub fn new(limit: u64) -> Self {
        Self { count: 0, limit }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Count one iteration; `true` once the count exceeds the limit.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        self.count > self.limit
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}
