// Collaborator contracts consumed by the tag core.
//
// Everything register-level lives behind these traits; the scheduler, codec
// and log writer only ever call them.

pub mod lis3dh;
pub mod nrf24;
pub mod spi_flash;

use crate::beacon::BEACON_SIZE;
use crate::config::RadioConfig;
use crate::motion::MotionSample;

pub trait Accelerometer {
    type Error;

    fn power(&mut self, on: bool) -> Result<(), Self::Error>;

    /// Only meaningful once the sensor has settled after `power(true)`.
    fn read(&mut self) -> Result<MotionSample, Self::Error>;
}

/// Short-range transceiver with a fixed frame size of `BEACON_SIZE`.
pub trait Radio {
    type Error;

    fn init(&mut self, config: &RadioConfig) -> Result<(), Self::Error>;
    fn set_power(&mut self, level: u8) -> Result<(), Self::Error>;
    fn set_receive_mode(&mut self, on: bool) -> Result<(), Self::Error>;
    fn transmit(&mut self, frame: &[u8; BEACON_SIZE]) -> Result<(), Self::Error>;
    fn chip_enable(&mut self, on: bool) -> Result<(), Self::Error>;
    fn irq_pending(&mut self) -> bool;
    fn read_frame(&mut self) -> Result<[u8; BEACON_SIZE], Self::Error>;
    fn fifo_empty(&mut self) -> Result<bool, Self::Error>;
    fn clear_interrupts(&mut self) -> Result<(), Self::Error>;
    fn power_down(&mut self) -> Result<(), Self::Error>;

    /// Re-enable the radio's bus clock after sleep. No-op where the bus clock
    /// cannot be gated while the driver is alive.
    fn resume_bus(&mut self) {}

    /// Gate the radio's bus clock for sleep.
    fn suspend_bus(&mut self) {}
}

/// Flat byte-addressed log region; offsets are managed by the caller.
pub trait Storage {
    type Error;

    fn capacity(&self) -> u32;
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Self::Error>;
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn erase(&mut self) -> Result<(), Self::Error>;
    fn status(&mut self) -> Result<u8, Self::Error>;
}

/// Small reset-surviving cell holding the log write cursor.
pub trait CursorStore {
    fn load(&self) -> u32;
    fn store(&mut self, offset: u32);
}

/// Status LED or equivalent.
pub trait Indicator {
    fn set(&mut self, on: bool);
}

/// Free-running, monotonically increasing timer.
pub trait Clock {
    fn ticks(&self) -> u32;
}
