use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::error::LimitError;
use crate::error::Result;
use crate::time::TimeSource;

/// Token bucket admission primitive using lock-free atomic operations
///
/// Budget refills continuously at `capacity / window` tokens per second, up to
/// `capacity`. Each admitted call subtracts its weight in a single CAS, so a
/// check-and-subtract can never jointly over-spend with a concurrent caller.
/// Refill is computed lazily from elapsed time at each attempt; there is no
/// background task.
///
/// Buckets never leave this crate: callers admit through the
/// [`Limiter`](crate::Limiter) façade, which owns them via its registry.
#[derive(Debug)]
pub struct TokenBucket {
    /// Current number of available tokens (scaled by TOKEN_SCALE)
    tokens: AtomicU32,

    /// Last refill timestamp in nanoseconds
    last_refill: AtomicU64,

    /// Maximum number of tokens (capacity)
    capacity: u32,

    /// Scaled tokens generated per nanosecond, multiplied by RATE_SCALE
    rate_per_nano: u64,

    /// Time source for consistent time measurements
    time_source: TimeSource,
}

// Scaling factors for fixed-point arithmetic to maintain precision
const TOKEN_SCALE: u32 = 1000;
const RATE_SCALE: u64 = 1_000_000_000;

/// Upper bound on a single wait slice so deadlines are re-checked promptly
const MAX_WAIT_SLICE: Duration = Duration::from_millis(100);

/// Lower bound on a single wait slice to avoid busy-spinning on tiny deficits
const MIN_WAIT_SLICE: Duration = Duration::from_millis(1);

impl TokenBucket {
    /// Create a new token bucket replenishing `capacity` tokens per `window`
    ///
    /// Rejects schedules the fixed-point accounting cannot represent: zero
    /// capacity, zero window, a capacity overflowing the token scale, and a
    /// window so long the refill rate truncates to zero (such a bucket would
    /// never replenish once drained).
    pub fn new(capacity: u32, window: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(LimitError::InvalidConfig("bucket capacity must be non-zero"));
        }
        if capacity > u32::MAX / TOKEN_SCALE {
            return Err(LimitError::InvalidConfig("bucket capacity too large"));
        }
        if window.is_zero() {
            return Err(LimitError::InvalidConfig("bucket refill window must be non-zero"));
        }

        // Scaled tokens per nanosecond, carried at RATE_SCALE precision so
        // sub-token refill amounts survive integer division
        let rate_per_nano = (capacity as u128 * TOKEN_SCALE as u128 * RATE_SCALE as u128 / window.as_nanos()) as u64;
        if rate_per_nano == 0 {
            return Err(LimitError::InvalidConfig("bucket refill window too long for capacity"));
        }

        let time_source = TimeSource::new();
        let now = time_source.now_nanos();

        Ok(Self { tokens: AtomicU32::new(capacity * TOKEN_SCALE), last_refill: AtomicU64::new(now), capacity, rate_per_nano, time_source })
    }

    /// Refill tokens based on elapsed time since last refill
    #[inline(always)]
    fn refill(&self) {
        let now = self.time_source.now_nanos();
        let last = self.last_refill.load(Ordering::Relaxed);

        let elapsed = now.saturating_sub(last);
        if elapsed == 0 {
            return;
        }

        let tokens_to_add_scaled = (elapsed as u128 * self.rate_per_nano as u128 / RATE_SCALE as u128) as u64;
        if tokens_to_add_scaled == 0 {
            // Too little time has passed to mint a scaled token; leave the
            // timestamp alone so short intervals accumulate
            return;
        }

        // Whoever wins the timestamp CAS owns the right to add the tokens
        if self.last_refill.compare_exchange(last, now, Ordering::Release, Ordering::Relaxed).is_ok() {
            let capacity_scaled = self.capacity * TOKEN_SCALE;
            loop {
                let current = self.tokens.load(Ordering::Acquire);
                let new_tokens = current.saturating_add(tokens_to_add_scaled.min(u64::from(u32::MAX)) as u32).min(capacity_scaled);

                if current == new_tokens {
                    // Already at capacity
                    break;
                }

                match self.tokens.compare_exchange_weak(current, new_tokens, Ordering::Release, Ordering::Relaxed) {
                    Ok(_) => break,
                    Err(_) => continue,
                }
            }
        }
    }

    /// Try to admit `weight` units without blocking
    ///
    /// Returns [`LimitError::Exhausted`] when the budget is short. A weight
    /// above the bucket capacity can never be admitted and is rejected as a
    /// configuration error instead.
    #[inline]
    pub fn try_acquire(&self, weight: u32) -> Result<()> {
        if weight == 0 {
            return Ok(());
        }
        if weight > self.capacity {
            return Err(LimitError::InvalidConfig("weight exceeds bucket capacity"));
        }

        self.refill();

        let required_tokens = weight * TOKEN_SCALE;

        loop {
            let current = self.tokens.load(Ordering::Acquire);

            if current < required_tokens {
                return Err(LimitError::Exhausted);
            }

            match self.tokens.compare_exchange_weak(current, current - required_tokens, Ordering::Release, Ordering::Relaxed) {
                Ok(_) => return Ok(()),
                Err(_) => continue, // CAS raced with another admission, retry
            }
        }
    }

    /// Admit `weight` units, waiting for refill as long as it takes
    ///
    /// The wait sleeps in bounded slices and re-checks, since concurrent
    /// consumers may claim the refilled budget first. Dropping the future
    /// cancels the wait without consuming anything.
    pub async fn acquire(&self, weight: u32) -> Result<()> {
        loop {
            match self.try_acquire(weight) {
                Ok(()) => return Ok(()),
                Err(LimitError::Exhausted) => {
                    let wait = self.shortfall_eta(weight).clamp(MIN_WAIT_SLICE, MAX_WAIT_SLICE);
                    trace!(weight, wait_us = wait.as_micros() as u64, "budget short, waiting for refill");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Admit `weight` units or give up at `deadline`
    ///
    /// An already-elapsed deadline fails immediately without touching the
    /// budget. Admission is all-or-nothing: a deadline failure consumes no
    /// tokens.
    pub async fn acquire_until(&self, weight: u32, deadline: Instant) -> Result<()> {
        if Instant::now() >= deadline {
            return Err(LimitError::DeadlineExceeded);
        }

        loop {
            match self.try_acquire(weight) {
                Ok(()) => return Ok(()),
                Err(LimitError::Exhausted) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(LimitError::DeadlineExceeded);
                    }
                    let wait = self.shortfall_eta(weight).clamp(MIN_WAIT_SLICE, MAX_WAIT_SLICE).min(deadline - now);
                    trace!(weight, wait_us = wait.as_micros() as u64, "budget short, waiting with deadline");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Estimate the time until `weight` tokens could be available
    fn shortfall_eta(&self, weight: u32) -> Duration {
        let current = self.tokens.load(Ordering::Acquire);
        let required = weight.saturating_mul(TOKEN_SCALE);
        let deficit = u128::from(required.saturating_sub(current));
        if deficit == 0 {
            return Duration::ZERO;
        }

        // rate_per_nano is validated non-zero at construction
        let nanos = (deficit * u128::from(RATE_SCALE)).div_ceil(u128::from(self.rate_per_nano));
        Duration::from_nanos(nanos.min(u128::from(u64::MAX)) as u64)
    }

    /// Get the number of currently available whole tokens
    pub fn available(&self) -> u32 {
        self.refill();
        self.tokens.load(Ordering::Relaxed) / TOKEN_SCALE
    }

    /// Get the maximum capacity
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Reset the bucket to full capacity
    pub fn reset(&self) {
        let now = self.time_source.now_nanos();
        self.tokens.store(self.capacity * TOKEN_SCALE, Ordering::Release);
        self.last_refill.store(now, Ordering::Release);
    }
}
