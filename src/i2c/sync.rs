// Licensed under the Apache-2.0 license

//! Synchronization between the calling thread and the interrupt handler.
//!
//! [`BusLock`] serializes whole transactions on one controller and
//! [`Completion`] carries "transaction finished" from the interrupt back to
//! the blocked caller. Both are plain atomics, so the interrupt side never
//! blocks. Bounded waits poll through an `embedded_hal` delay provider.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};
use embedded_hal::delay::DelayNs;
use fugit::MillisDurationU32;

/// Interval between two polls of a bounded wait.
pub const POLL_INTERVAL_US: u32 = 100;

fn poll_budget(timeout: MillisDurationU32) -> u32 {
    timeout.ticks().saturating_mul(1000) / POLL_INTERVAL_US
}

/// Poll `ready` until it succeeds or `timeout` elapses.
fn wait_until<D, F>(delay: &mut D, timeout: MillisDurationU32, mut ready: F) -> bool
where
    D: DelayNs,
    F: FnMut() -> bool,
{
    let mut budget = poll_budget(timeout);
    loop {
        if ready() {
            return true;
        }
        if budget == 0 {
            return false;
        }
        budget -= 1;
        delay.delay_us(POLL_INTERVAL_US);
    }
}

/// Exclusive-access lock for one controller. Not reentrant.
#[derive(Debug, Default)]
pub struct BusLock {
    held: AtomicBool,
}

impl BusLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Try once to take the lock.
    ///
    /// # Errors
    ///
    /// `WouldBlock` while another owner holds it.
    pub fn try_acquire(&self) -> nb::Result<BusLockGuard<'_>, Infallible> {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| BusLockGuard { lock: self })
            .map_err(|_| nb::Error::WouldBlock)
    }

    /// Take the lock, waiting at most `timeout`.
    pub fn acquire<D: DelayNs>(
        &self,
        delay: &mut D,
        timeout: MillisDurationU32,
    ) -> Option<BusLockGuard<'_>> {
        let mut guard = None;
        wait_until(delay, timeout, || {
            guard = self.try_acquire().ok();
            guard.is_some()
        });
        guard
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }
}

/// Releases the [`BusLock`] when dropped.
#[derive(Debug)]
pub struct BusLockGuard<'l> {
    lock: &'l BusLock,
}

impl Drop for BusLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}

/// Single-slot completion signal.
///
/// Must be reset before each armed transfer so a late signal from an
/// abandoned transfer is not consumed by the next one.
#[derive(Debug, Default)]
pub struct Completion {
    done: AtomicBool,
}

impl Completion {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    pub fn reset(&self) {
        self.done.store(false, Ordering::Release);
    }

    /// Called from interrupt context. Signals taken twice collapse into one.
    pub fn signal(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Consume the signal if it is set.
    ///
    /// # Errors
    ///
    /// `WouldBlock` while not signaled.
    pub fn poll(&self) -> nb::Result<(), Infallible> {
        if self.done.swap(false, Ordering::Acquire) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Wait for the signal at most `timeout`. Returns `false` on expiry.
    pub fn wait<D: DelayNs>(&self, delay: &mut D, timeout: MillisDurationU32) -> bool {
        wait_until(delay, timeout, || self.poll().is_ok())
    }
}
