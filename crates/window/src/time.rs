//! Injectable clocks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Abstracts the current instant so sources can be driven by virtual time in
/// tests. Implementations must be non-decreasing.
pub trait TimeProvider: fmt::Debug + Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// The default [`TimeProvider`], backed by the monotonic system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A [`TimeProvider`] returning the system clock shifted by an accumulated
/// offset. [`restless_sleep`](Self::restless_sleep) advances virtual time
/// without actually sleeping, which keeps window tests fast and
/// deterministic. Share one instance between a test and its source via
/// [`Arc`](std::sync::Arc).
#[derive(Debug, Default)]
pub struct OffsetTimeProvider {
    offset_nanos: AtomicU64,
}

impl OffsetTimeProvider {
    /// Creates a provider with no offset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances virtual time by `duration` without sleeping.
    pub fn restless_sleep(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for OffsetTimeProvider {
    fn now(&self) -> Instant {
        Instant::now() + Duration::from_nanos(self.offset_nanos.load(Ordering::Relaxed))
    }
}
