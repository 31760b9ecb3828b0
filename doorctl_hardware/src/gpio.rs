//! Raspberry Pi adapters: HC-SR04 style sensor and the opener's trigger relay.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use doorctl_traits::{EchoCell, MotorActuator, RangingPins};
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::spin_delay_us;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

#[inline]
fn micros_since(epoch: Instant) -> u32 {
    (epoch.elapsed().as_micros() & u128::from(u32::MAX)) as u32
}

/// Ultrasonic sensor on two GPIO lines.
///
/// The echo line's falling edge fires an async interrupt that stamps the
/// shared [`EchoCell`] while the sensor is armed.
pub struct Hcsr04 {
    trigger: OutputPin,
    // held so the interrupt stays registered
    _echo: InputPin,
    armed: Arc<AtomicBool>,
    epoch: Instant,
}

impl Hcsr04 {
    pub fn new(gpio: &Gpio, trigger_bcm: u8, echo_bcm: u8, cell: Arc<EchoCell>) -> Result<Self> {
        let mut trigger = gpio.get(trigger_bcm).map_err(gpio_err)?.into_output();
        trigger.set_low();
        let mut echo = gpio.get(echo_bcm).map_err(gpio_err)?.into_input();
        let armed = Arc::new(AtomicBool::new(false));
        let epoch = Instant::now();
        let armed_isr = Arc::clone(&armed);
        echo.set_async_interrupt(Trigger::FallingEdge, move |_level: Level| {
            if armed_isr.load(Ordering::Acquire) {
                cell.record(micros_since(epoch));
            }
        })
        .map_err(gpio_err)?;
        Ok(Self {
            trigger,
            _echo: echo,
            armed,
            epoch,
        })
    }
}

impl RangingPins for Hcsr04 {
    fn set_trigger(&mut self, high: bool) -> std::result::Result<(), BoxError> {
        self.trigger.write(if high { Level::High } else { Level::Low });
        Ok(())
    }

    fn set_echo_interrupt(&mut self, enabled: bool) {
        self.armed.store(enabled, Ordering::Release);
    }

    fn delay_us(&mut self, us: u32) {
        spin_delay_us(us);
    }

    fn micros(&self) -> u32 {
        micros_since(self.epoch)
    }
}

/// Relay (or transistor) wired across the opener's wall button.
pub struct RelayTrigger {
    pin: OutputPin,
    active_low: bool,
}

impl RelayTrigger {
    pub fn new(gpio: &Gpio, bcm: u8, active_low: bool) -> Result<Self> {
        let pin = gpio.get(bcm).map_err(gpio_err)?.into_output();
        let mut relay = Self { pin, active_low };
        relay.release();
        Ok(relay)
    }

    fn level(&self, active: bool) -> Level {
        if active != self.active_low {
            Level::High
        } else {
            Level::Low
        }
    }

    fn release(&mut self) {
        let level = self.level(false);
        self.pin.write(level);
    }
}

impl MotorActuator for RelayTrigger {
    fn pulse(&mut self, width: Duration) -> std::result::Result<(), BoxError> {
        let level = self.level(true);
        self.pin.write(level);
        std::thread::sleep(width);
        self.release();
        trace!(width_ms = width.as_millis() as u64, "relay pulsed");
        Ok(())
    }
}

/// BCM pin numbers of the three lines the controller drives.
#[derive(Debug, Clone, Copy)]
pub struct PinMap {
    pub trigger: u8,
    pub echo: u8,
    pub motor: u8,
}

/// Open the GPIO chip and claim every line.
pub fn open(pins: PinMap, cell: Arc<EchoCell>) -> Result<(Hcsr04, RelayTrigger)> {
    let gpio = Gpio::new().map_err(gpio_err)?;
    let sensor = Hcsr04::new(&gpio, pins.trigger, pins.echo, cell)?;
    let relay = RelayTrigger::new(&gpio, pins.motor, false)?;
    Ok((sensor, relay))
}
