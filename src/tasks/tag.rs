use defmt::info;
use embassy_time::{Delay, Instant};

use crate::drivers::Clock;
use crate::hal::{BoardAccel, BoardFlash, BoardLed, BoardRadio, RtcCursor};
use crate::scheduler::Scheduler;

/// Free-running embassy time base, truncated to 32 bits.
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn ticks(&self) -> u32 {
        Instant::now().as_ticks() as u32
    }
}

pub type BoardScheduler =
    Scheduler<BoardAccel, BoardRadio, BoardFlash, RtcCursor, BoardLed, EmbassyClock, Delay>;

#[embassy_executor::task]
pub async fn tag_task(scheduler: BoardScheduler) {
    info!("Starting beacon loop…");
    scheduler.run().await
}
