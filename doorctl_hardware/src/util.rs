use std::time::{Duration, Instant};

use doorctl_traits::{EchoCell, RangingPins};

use crate::error::{HwError, Result};

/// Wait until `ready` returns true or `timeout` expires. Sleeps in small
/// intervals to avoid CPU spinning.
pub fn wait_until_with_timeout(
    mut ready: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !ready() {
        if Instant::now() >= deadline {
            return Err(HwError::EchoTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Busy-wait for `us` microseconds. Trigger pulses are too short for `sleep`.
#[inline]
pub fn spin_delay_us(us: u32) {
    let until = Instant::now() + Duration::from_micros(u64::from(us));
    while Instant::now() < until {
        std::hint::spin_loop();
    }
}

/// One blocking pulse/echo measurement, outside the control loop.
///
/// Used for bring-up checks; the controller itself never blocks on an echo.
pub fn measure_blocking(
    pins: &mut impl RangingPins,
    echo: &EchoCell,
    us_per_cm: u32,
    timeout: Duration,
) -> Result<u16> {
    let gpio = |e: Box<dyn std::error::Error + Send + Sync>| HwError::Gpio(e.to_string());
    pins.set_echo_interrupt(false);
    echo.clear();
    pins.set_trigger(true).map_err(gpio)?;
    pins.set_echo_interrupt(true);
    pins.delay_us(10);
    pins.set_trigger(false).map_err(gpio)?;
    let started = pins.micros();
    let waited = wait_until_with_timeout(|| echo.is_pending(), timeout, Duration::from_micros(200));
    pins.set_echo_interrupt(false);
    waited?;
    let stamp = echo.take().ok_or(HwError::EchoTimeout)?;
    let cm = stamp.wrapping_sub(started) / us_per_cm.max(1);
    Ok(u16::try_from(cm).unwrap_or(u16::MAX))
}
