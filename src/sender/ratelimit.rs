//! Event-rate admission control.
//!
//! A single token bucket shared by every worker across all signals: fill
//! rate `R` events per second, burst capacity `2R`. A wait reserves its
//! tokens up front (the balance may go negative, which is the queue of
//! waiters expressed as debt), sleeps out the computed delay, and rolls the
//! reservation back if cancellation wins the race.

use crate::core::{BlastError, Result};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Burst capacity as a multiple of the fill rate
const BURST_FACTOR: f64 = 2.0;

/// Shared token-bucket governor over the total event budget
#[derive(Debug)]
pub struct RateGovernor {
    bucket: Option<Mutex<TokenBucket>>,
}

impl RateGovernor {
    /// `events_per_second <= 0` disables admission control entirely
    pub fn new(events_per_second: i64) -> Self {
        let bucket = (events_per_second > 0).then(|| {
            let rate = events_per_second as f64;
            Mutex::new(TokenBucket::new(rate, rate * BURST_FACTOR))
        });
        RateGovernor { bucket }
    }

    pub fn enabled(&self) -> bool {
        self.bucket.is_some()
    }

    /// Reserve `n` event tokens and sleep until they are due. Returns
    /// `Cancelled` (and surrenders the reservation) if the token fires
    /// first. A reservation larger than the bucket can ever hold is treated
    /// as a no-op rather than a failure.
    pub async fn wait(&self, cancel: &CancellationToken, n: usize) -> Result<()> {
        let Some(bucket) = &self.bucket else {
            return Ok(());
        };

        let delay = {
            let mut bucket = bucket.lock();
            match bucket.reserve(n as f64, Instant::now()) {
                Some(delay) => delay,
                None => return Ok(()),
            }
        };

        if delay.is_zero() {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => {
                bucket.lock().release(n as f64);
                Err(BlastError::Cancelled)
            }
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    /// Tokens added per second
    rate: f64,
    /// Maximum token balance
    capacity: f64,
    /// Current balance; negative means reservations are queued ahead
    available: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate: f64, capacity: f64) -> Self {
        TokenBucket {
            rate,
            capacity,
            available: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Take `n` tokens, returning how long the caller must wait for its
    /// reservation to mature. `None` means the reservation can never be
    /// filled (n exceeds capacity) and should be skipped.
    fn reserve(&mut self, n: f64, now: Instant) -> Option<Duration> {
        if n > self.capacity {
            return None;
        }

        self.refill(now);
        self.available -= n;

        if self.available >= 0.0 {
            Some(Duration::ZERO)
        } else {
            Some(Duration::from_secs_f64(-self.available / self.rate))
        }
    }

    /// Return a surrendered reservation to the bucket
    fn release(&mut self, n: f64) {
        self.available = (self.available + n).min(self.capacity);
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.available = (self.available + elapsed.as_secs_f64() * self.rate).min(self.capacity);
        self.last_refill = now;
    }
}
