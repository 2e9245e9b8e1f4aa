//! Seconds counter advanced by the RTC seconds interrupt.

use portable_atomic::{AtomicU32, Ordering};

/// Elapsed-seconds counter shared between interrupt and thread context.
///
/// The interrupt side only ever calls [`tick`](Self::tick); thread context
/// resets the counter before arming a sleep and reads it back on wake.
#[derive(Debug)]
pub struct SleepTimer {
    seconds: AtomicU32,
}

impl SleepTimer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seconds: AtomicU32::new(0),
        }
    }

    /// Adds one elapsed second. Wraps at `u32::MAX`.
    pub fn tick(&self) {
        self.seconds.fetch_add(1, Ordering::Release);
    }

    /// Seconds counted since the last reset.
    #[must_use]
    pub fn elapsed(&self) -> u32 {
        self.seconds.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.seconds.store(0, Ordering::Release);
    }

    /// Reads the counter and clears it in one step, so a tick landing between
    /// the read and the clear is never lost.
    pub fn take(&self) -> u32 {
        self.seconds.swap(0, Ordering::AcqRel)
    }

    #[must_use]
    pub fn has_reached(&self, seconds: u32) -> bool {
        self.elapsed() >= seconds
    }
}

impl Default for SleepTimer {
    fn default() -> Self {
        Self::new()
    }
}
