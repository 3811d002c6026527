// ─────────────────────────────────────────────────────────────────────────────
// Several chip-select lines on one blocking SPI bus.
//
// The radio and the log flash sit on the same bus; each gets a
// `SharedSpiDevice` that owns its CS pin and borrows the bus through a
// `NoopRawMutex` (everything runs on one executor thread).

use core::cell::RefCell;

use embassy_embedded_hal::shared_bus::blocking::spi::SpiDevice;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;

pub use embassy_embedded_hal::shared_bus::SpiDeviceError;

pub type SharedBus<BUS> = Mutex<NoopRawMutex, RefCell<BUS>>;

/// CS must already be driven high (deselected) when the device is built.
pub type SharedSpiDevice<'a, BUS, CS> = SpiDevice<'a, NoopRawMutex, BUS, CS>;

pub fn shared_bus<BUS>(bus: BUS) -> SharedBus<BUS> {
    Mutex::new(RefCell::new(bus))
}

// ─────────────────────────────────────────────────────────────────────────────
// ESP32-C6 board types

#[cfg(feature = "esp32c6")]
pub use board::*;

#[cfg(feature = "esp32c6")]
mod board {
    use esp_hal::gpio::{Input, Output};
    use esp_hal::i2c::master::I2c;
    use esp_hal::spi::master::Spi;

    use crate::drivers::lis3dh::Lis3dh;
    use crate::drivers::nrf24::Nrf24;
    use crate::drivers::spi_flash::SpiFlash;
    use crate::led::Led;

    pub type HalI2c<'a> = I2c<'a, esp_hal::Blocking>;
    pub type HalSpi<'a> = Spi<'a, esp_hal::Blocking>;
    pub type BoardSpiDevice = super::SharedSpiDevice<'static, HalSpi<'static>, Output<'static>>;

    pub type BoardAccel = Lis3dh<HalI2c<'static>>;
    pub type BoardRadio = Nrf24<BoardSpiDevice, Output<'static>, Input<'static>>;
    pub type BoardFlash = SpiFlash<BoardSpiDevice, esp_hal::delay::Delay>;
    pub type BoardLed = Led<Output<'static>>;

    // survives software and deep-sleep resets, garbage after power-on
    #[esp_hal::ram(unstable(rtc_fast, persistent))]
    static mut LOG_CURSOR: u32 = 0;

    /// Log cursor cell in RTC fast memory.
    pub struct RtcCursor {
        _private: (),
    }

    impl RtcCursor {
        /// Only one handle may exist; the binary creates it once at boot.
        pub fn new() -> Self {
            Self { _private: () }
        }
    }

    impl crate::drivers::CursorStore for RtcCursor {
        fn load(&self) -> u32 {
            // SAFETY: single executor thread, only accessed through this handle
            unsafe { core::ptr::addr_of!(LOG_CURSOR).read_volatile() }
        }

        fn store(&mut self, offset: u32) {
            // SAFETY: as above
            unsafe { core::ptr::addr_of_mut!(LOG_CURSOR).write_volatile(offset) }
        }
    }
}
