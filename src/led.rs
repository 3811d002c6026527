use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::drivers::Indicator;

/// Single GPIO status LED.
pub struct Led<P> {
    pin: P,
    active_low: bool,
}

impl<P: OutputPin> Led<P> {
    /// LED wired between the pin and ground.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            active_low: false,
        }
    }

    /// LED wired between the supply and the pin.
    pub fn new_active_low(pin: P) -> Self {
        Self {
            pin,
            active_low: true,
        }
    }
}

impl<P: OutputPin> Indicator for Led<P> {
    fn set(&mut self, on: bool) {
        // GPIO writes on this board cannot fail
        let _ = if on != self.active_low {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }
}

/// Light the indicator for `on_ms`, then switch it off.
pub async fn blink<I: Indicator, D: DelayNs>(indicator: &mut I, delay: &mut D, on_ms: u32) {
    indicator.set(true);
    delay.delay_ms(on_ms).await;
    indicator.set(false);
}
