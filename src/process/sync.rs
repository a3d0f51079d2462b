//! Counting semaphore used for the exit/wait hand-off.

use core::sync::atomic::{AtomicU32, Ordering};

/// Counting semaphore.
///
/// `down` does not sleep by itself: it calls `relax` between attempts, and
/// the caller passes something that hands the CPU to another thread.
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: AtomicU32,
}

impl Semaphore {
    /// Create a semaphore holding `permits`.
    pub const fn new(permits: u32) -> Self {
        Self {
            permits: AtomicU32::new(permits),
        }
    }

    /// Take a permit if one is available.
    pub fn try_down(&self) -> bool {
        let mut current = self.permits.load(Ordering::Acquire);
        while current > 0 {
            match self.permits.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    /// Take a permit, calling `relax` until one shows up.
    pub fn down(&self, mut relax: impl FnMut()) {
        while !self.try_down() {
            relax();
        }
    }

    /// Release one permit.
    pub fn up(&self) {
        self.permits.fetch_add(1, Ordering::AcqRel);
    }

    /// Permits currently available.
    pub fn permits(&self) -> u32 {
        self.permits.load(Ordering::Acquire)
    }
}
