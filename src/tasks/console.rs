use defmt::{info, warn};
use embassy_time::{Duration, Timer};
use esp_hal::gpio::Input;
use esp_hal::uart::Uart;
use esp_hal::Blocking;

use crate::console::Console;
use crate::drivers::Indicator;
use crate::hal::{BoardFlash, BoardLed, RtcCursor};

pub type BoardConsole = Console<BoardFlash, RtcCursor>;

const POLL_INTERVAL_MS: u64 = 10;

/// Polls the UART and feeds the diagnostic console. Unplugging the host
/// restarts the tag so it comes back up in beacon mode.
#[embassy_executor::task]
pub async fn console_task(
    mut uart: Uart<'static, Blocking>,
    mut console: BoardConsole,
    host_sense: Input<'static>,
    mut led: BoardLed,
) {
    info!("Host attached, console on UART0");
    if console.prompt(&mut uart).is_err() {
        warn!("console write failed");
    }

    let mut buf = [0u8; 64];
    loop {
        if host_sense.is_low() {
            info!("Host detached, restarting");
            esp_hal::system::software_reset();
        }

        if embedded_io::ReadReady::read_ready(&mut uart).unwrap_or(false) {
            match embedded_io::Read::read(&mut uart, &mut buf) {
                Ok(n) if n > 0 => {
                    led.set(true);
                    if console.handle(&buf[..n], &mut uart).is_err() {
                        warn!("console write failed");
                    }
                    led.set(false);
                }
                Ok(_) => {}
                Err(_) => warn!("UART read error"),
            }
        }

        Timer::after(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}
