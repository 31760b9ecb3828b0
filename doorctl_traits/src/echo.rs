//! Interrupt-to-loop hand-off for the echo timestamp.

use std::sync::atomic::{AtomicU32, Ordering};

/// Single-writer/single-reader cell carrying the last echo timestamp.
///
/// The interrupt handler is the only writer and does exactly one store; the
/// control loop is the only reader. `0` means "no echo", so a genuine stamp of
/// zero is nudged to one microsecond.
#[derive(Debug, Default)]
pub struct EchoCell {
    stamp: AtomicU32,
}

impl EchoCell {
    pub const fn new() -> Self {
        Self {
            stamp: AtomicU32::new(0),
        }
    }

    /// Record an echo edge. Safe to call from interrupt context.
    #[inline]
    pub fn record(&self, micros: u32) {
        self.stamp.store(micros.max(1), Ordering::Release);
    }

    /// Consume the pending stamp, if any.
    #[inline]
    pub fn take(&self) -> Option<u32> {
        match self.stamp.swap(0, Ordering::AcqRel) {
            0 => None,
            v => Some(v),
        }
    }

    /// Drop a stale stamp before arming a new measurement.
    #[inline]
    pub fn clear(&self) {
        self.stamp.store(0, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.stamp.load(Ordering::Acquire) != 0
    }
}
