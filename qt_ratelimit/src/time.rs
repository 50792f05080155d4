use tokio::time::Instant;

/// Time tracking for bucket refill arithmetic
///
/// Uses `tokio::time::Instant` so tests running under a paused runtime clock
/// (`test-util`) observe the same frozen time the sleeps do. Outside a
/// runtime this degrades to plain monotonic time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimeSource {
    /// Epoch for relative time measurements
    epoch: Instant,
}

impl TimeSource {
    /// Create a new time source with current time as epoch
    #[inline(always)]
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    /// Get current time in nanoseconds since epoch
    #[inline(always)]
    pub fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

impl Default for TimeSource {
    fn default() -> Self {
        Self::new()
    }
}
