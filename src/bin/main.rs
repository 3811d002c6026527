#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay as BusyDelay;
use esp_hal::efuse::Efuse;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode;
use esp_hal::time::Rate;
use esp_hal::timer::systimer::SystemTimer;
use esp_hal::uart::{Config as UartConfig, Uart};
use panic_rtt_target as _;
use static_cell::StaticCell;

use esp_beacon_tag::beacon::DeviceIdentity;
use esp_beacon_tag::config::{TagConfig, LOG_STORAGE_SIZE};
use esp_beacon_tag::console::Console;
use esp_beacon_tag::drivers::lis3dh::Lis3dh;
use esp_beacon_tag::drivers::nrf24::Nrf24;
use esp_beacon_tag::drivers::spi_flash::SpiFlash;
use esp_beacon_tag::hal::{shared_bus, HalSpi, RtcCursor, SharedBus, SharedSpiDevice};
use esp_beacon_tag::led::Led;
use esp_beacon_tag::logfile::LogWriter;
use esp_beacon_tag::scheduler::{Scheduler, TagHardware};
use esp_beacon_tag::tasks::console::console_task;
use esp_beacon_tag::tasks::tag::{tag_task, EmbassyClock};

// ── pin map (ESP32-C6) ───────────────────────────────────────────────────────
//   I2C0  SDA GPIO4  SCL GPIO5           LIS3DH
//   SPI2  SCK GPIO6  MOSI GPIO7 MISO GPIO2
//         radio CSN GPIO10 CE GPIO11 IRQ GPIO3
//         flash CS  GPIO18
//   UART0 TX GPIO16  RX GPIO17           console
//   LED   GPIO15 (active low)
//   host sense GPIO19 (high = attached)

static SPI_BUS: StaticCell<SharedBus<HalSpi<'static>>> = StaticCell::new();

async fn park() -> ! {
    loop {
        Timer::after(Duration::from_millis(1000)).await;
    }
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    rtt_target::rtt_init_defmt!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    info!("Embassy initialized!");

    let identity = DeviceIdentity::from_bytes(&Efuse::read_base_mac_address());
    let tag_config = TagConfig::default();
    info!("Tag ID {=u16:#x}", identity.tag_id());

    let led = Led::new_active_low(Output::new(
        peripherals.GPIO15,
        Level::High,
        OutputConfig::default(),
    ));
    let host_sense = Input::new(
        peripherals.GPIO19,
        InputConfig::default().with_pull(Pull::Down),
    );

    // ── shared SPI bus: radio + log flash ───────────────────────────────────
    let spi_config = SpiConfig::default()
        .with_frequency(Rate::from_mhz(8))
        .with_mode(Mode::_0);
    let spi = match Spi::new(peripherals.SPI2, spi_config) {
        Ok(spi) => spi
            .with_sck(peripherals.GPIO6)
            .with_mosi(peripherals.GPIO7)
            .with_miso(peripherals.GPIO2),
        Err(_) => {
            error!("SPI initialization failed");
            park().await
        }
    };
    let bus: &'static SharedBus<HalSpi<'static>> = SPI_BUS.init(shared_bus(spi));

    // both chip selects start deselected
    let radio_csn = Output::new(peripherals.GPIO10, Level::High, OutputConfig::default());
    let flash_cs = Output::new(peripherals.GPIO18, Level::High, OutputConfig::default());
    let radio_spi = SharedSpiDevice::new(bus, radio_csn);
    let flash_spi = SharedSpiDevice::new(bus, flash_cs);

    let flash = SpiFlash::new(flash_spi, BusyDelay::new(), LOG_STORAGE_SIZE);
    let log = match LogWriter::restore(flash, RtcCursor::new()) {
        Ok(log) => log,
        Err(_) => {
            error!("Log storage unavailable");
            park().await
        }
    };

    // ── host attached: diagnostic console instead of the beacon loop ───────
    if host_sense.is_high() {
        let uart = match Uart::new(peripherals.UART0, UartConfig::default()) {
            Ok(uart) => uart.with_tx(peripherals.GPIO16).with_rx(peripherals.GPIO17),
            Err(_) => {
                error!("UART initialization failed");
                park().await
            }
        };
        let console = Console::new(identity, &tag_config.radio, log);
        if spawner
            .spawn(console_task(uart, console, host_sense, led))
            .is_err()
        {
            error!("Failed to spawn console task");
        }
        return;
    }

    // ── accelerometer ───────────────────────────────────────────────────────
    let i2c_config = I2cConfig::default().with_frequency(Rate::from_khz(400));
    let i2c = match I2c::new(peripherals.I2C0, i2c_config) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO4).with_scl(peripherals.GPIO5),
        Err(_) => {
            error!("I2C initialization failed");
            park().await
        }
    };
    let mut accel = Lis3dh::new(i2c);
    if accel.init().is_err() {
        warn!("LIS3DH not responding, motion detection degraded");
    }

    // ── radio ───────────────────────────────────────────────────────────────
    let radio = Nrf24::new(
        radio_spi,
        Output::new(peripherals.GPIO11, Level::Low, OutputConfig::default()),
        Input::new(peripherals.GPIO3, InputConfig::default().with_pull(Pull::Up)),
    );

    let hw = TagHardware {
        accel,
        radio,
        indicator: led,
        clock: EmbassyClock,
        delay: Delay,
    };
    let scheduler = Scheduler::new(tag_config, identity, hw, log);

    if spawner.spawn(tag_task(scheduler)).is_err() {
        error!("Failed to spawn tag task");
    }
}
