use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use switchyard_core::{ApiError, ApiResult};
use tokio::time::Instant;

/// A token bucket that rejects calls over its sustained rate.
///
/// The bucket refills at `permits` per `per` and holds at most `burst`
/// permits, so up to `burst` calls pass back to back after a quiet period.
/// Implemented as a generic cell rate algorithm: only the theoretical arrival
/// time of the next permit is stored.
pub struct RateLimiter {
    interval: Duration,
    tolerance: Duration,
    next_free: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Allows `permits` calls per `per`, with bursts of up to `burst` calls.
    ///
    /// Zero `permits` or `burst` are treated as one.
    pub fn new(permits: u32, per: Duration, burst: u32) -> Self {
        let interval = per / permits.max(1);
        Self {
            interval,
            tolerance: interval * burst.max(1),
            next_free: Mutex::new(None),
        }
    }

    /// Takes one permit, or fails with [`ApiError::RateLimited`] carrying the
    /// time until a permit is available.
    pub fn try_acquire(&self) -> ApiResult<()> {
        Self::try_acquire_all([self])
    }

    /// Takes one permit from every limiter in `gates`, or from none of them.
    ///
    /// All limiters are locked for the duration of the check, in iteration
    /// order; callers must pass them in a consistent order and without
    /// duplicates. A rejection reports the longest wait among the limiters
    /// that rejected.
    pub fn try_acquire_all<'a, I>(gates: I) -> ApiResult<()>
    where
        I: IntoIterator<Item = &'a RateLimiter>,
    {
        let now = Instant::now();
        let mut admitted = Vec::new();
        let mut rejected: Option<Duration> = None;

        for gate in gates {
            let next_free = gate.next_free.lock();
            match gate.admit(*next_free, now) {
                Ok(arrival) => admitted.push((next_free, arrival)),
                Err(wait) => rejected = Some(rejected.map_or(wait, |longest| longest.max(wait))),
            }
        }

        if let Some(retry_after) = rejected {
            return Err(ApiError::RateLimited { retry_after });
        }
        for (mut next_free, arrival) in admitted {
            *next_free = Some(arrival);
        }
        Ok(())
    }

    /// Number of calls that would pass right now, back to back.
    pub fn available(&self) -> u32 {
        let now = Instant::now();
        let backlog = self
            .next_free
            .lock()
            .map_or(Duration::ZERO, |at| at.saturating_duration_since(now));
        let room = self.tolerance.saturating_sub(backlog);
        (room.as_nanos() / self.interval.as_nanos().max(1)) as u32
    }

    /// Arrival time of the permit taken at `now`, or the wait until one is free.
    fn admit(&self, next_free: Option<Instant>, now: Instant) -> Result<Instant, Duration> {
        let start = next_free.map_or(now, |at| at.max(now));
        let arrival = start + self.interval;
        let ahead = arrival.saturating_duration_since(now);

        if ahead > self.tolerance {
            Err(ahead - self.tolerance)
        } else {
            Ok(arrival)
        }
    }

    /// Time between two permits at the sustained rate.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("interval", &self.interval)
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}
