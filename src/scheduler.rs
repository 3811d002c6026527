// Duty-cycle scheduler
//
// One cooperative loop. Each cycle:
//   sleep (jittered) → resume radio bus →
//     sensor cycle   (every cycle while moving, every 16th while still)
//     transmit cycle (all other cycles)
//   → radio power down → suspend radio bus
//
// A sensor cycle samples the accelerometer, feeds the motion detector and,
// while moving, keeps the receiver open for the settle time and drains any
// frames it caught into the log. A transmit cycle sends one encrypted
// beacon at a power class alternating with the cycle parity.
//
// Collaborator errors only degrade the current cycle; nothing is retried.

use embedded_hal_async::delay::DelayNs;

use crate::beacon::{verify, BeaconPacket, DeviceIdentity, PeerStats};
use crate::cipher::Xxtea;
use crate::config::{
    RadioConfig, TagConfig, TxStrength, ACC_SETTLE_MS, FAILURE_BLINK_MS, MAX_FRAMES_PER_DRAIN,
    READY_BLINK_MS, RX_BLINK_MS, SLEEP_JITTER_MS, SLEEP_MOVING_MS, SLEEP_STILL_MS,
    STILL_SENSOR_CYCLE_MASK, TX_SETTLE_MS, WARMUP_BLINK_MS,
};
use crate::drivers::{Accelerometer, Clock, CursorStore, Indicator, Radio, Storage};
use crate::jitter::Jitter;
use crate::led::blink;
use crate::logfile::{LogEntry, LogError, LogWriter};
use crate::motion::MotionDetector;
use crate::{debug, error, info, warn};

/// Everything the loop remembers between cycles.
#[derive(Debug, Clone)]
pub struct TagContext {
    pub identity: DeviceIdentity,
    pub motion: MotionDetector,
    pub peers: PeerStats,
    pub radio: RadioConfig,
    pub jitter: Jitter,
    pub cycle: u32,
}

impl TagContext {
    pub fn new(identity: DeviceIdentity, radio: RadioConfig) -> Self {
        Self {
            identity,
            motion: MotionDetector::new(),
            peers: PeerStats::default(),
            radio,
            jitter: Jitter::new(identity.seed()),
            cycle: 0,
        }
    }

    /// Whether the current cycle reads the accelerometer instead of transmitting.
    pub fn is_sensor_cycle(&self) -> bool {
        self.motion.is_moving() || self.cycle & STILL_SENSOR_CYCLE_MASK == 0
    }
}

/// The devices the loop drives, other than log storage.
pub struct TagHardware<A, R, I, K, D> {
    pub accel: A,
    pub radio: R,
    pub indicator: I,
    pub clock: K,
    pub delay: D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleKind {
    Sensor,
    Transmit,
}

/// What one pass through the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleReport {
    pub cycle: u32,
    pub kind: CycleKind,
    pub slept_ms: u32,
    /// Motion state at the end of the cycle.
    pub moving: bool,
    pub frames_received: u32,
    pub frames_logged: u32,
}

pub struct Scheduler<A, R, S, C, I, K, D> {
    ctx: TagContext,
    hw: TagHardware<A, R, I, K, D>,
    log: LogWriter<S, C>,
    cipher: Xxtea,
    storage_full_reported: bool,
}

impl<A, R, S, C, I, K, D> Scheduler<A, R, S, C, I, K, D>
where
    A: Accelerometer,
    R: Radio,
    S: Storage,
    C: CursorStore,
    I: Indicator,
    K: Clock,
    D: DelayNs,
{
    pub fn new(
        config: TagConfig,
        identity: DeviceIdentity,
        hw: TagHardware<A, R, I, K, D>,
        log: LogWriter<S, C>,
    ) -> Self {
        Self {
            ctx: TagContext::new(identity, config.radio),
            hw,
            log,
            cipher: Xxtea::new(config.key),
            storage_full_reported: false,
        }
    }

    /// Boot then cycle forever. A radio that fails to come up parks the tag
    /// in the failure blink loop.
    pub async fn run(mut self) -> ! {
        if self.boot().await.is_err() {
            self.halt().await;
        }
        loop {
            self.run_cycle().await;
        }
    }

    /// Radio bring-up and the readiness blink.
    pub async fn boot(&mut self) -> Result<(), R::Error> {
        info!("tag {} booting", self.ctx.identity.tag_id());

        self.hw.radio.resume_bus();
        if let Err(e) = self.hw.radio.init(&self.ctx.radio) {
            error!("radio init failed");
            return Err(e);
        }
        self.ctx.radio.tx_power = TxStrength::High;
        if self.hw.radio.set_power(TxStrength::High.power_level()).is_err() {
            warn!("radio power setup failed");
        }
        self.hw.radio.power_down().ok();
        self.hw.radio.suspend_bus();

        blink(&mut self.hw.indicator, &mut self.hw.delay, READY_BLINK_MS).await;
        info!("tag ready, {} log entries stored", self.log.len());
        Ok(())
    }

    /// Visible failure indicator: 500 ms on, 500 ms off, forever.
    pub async fn halt(&mut self) -> ! {
        loop {
            blink(&mut self.hw.indicator, &mut self.hw.delay, FAILURE_BLINK_MS).await;
            self.hw.delay.delay_ms(FAILURE_BLINK_MS).await;
        }
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        let cycle = self.ctx.cycle;

        let base = if self.ctx.motion.is_moving() {
            SLEEP_MOVING_MS
        } else {
            SLEEP_STILL_MS
        };
        let slept_ms = base + self.ctx.jitter.next(SLEEP_JITTER_MS, self.hw.clock.ticks());
        self.hw.delay.delay_ms(slept_ms).await;

        self.hw.radio.resume_bus();

        let mut report = CycleReport {
            cycle,
            kind: CycleKind::Transmit,
            slept_ms,
            moving: false,
            frames_received: 0,
            frames_logged: 0,
        };

        if self.ctx.is_sensor_cycle() {
            report.kind = CycleKind::Sensor;
            self.sensor_cycle(&mut report).await;
        } else {
            self.transmit_cycle().await;
        }

        if self.hw.radio.power_down().is_err() {
            warn!("radio power down failed");
        }
        self.hw.radio.suspend_bus();

        report.moving = self.ctx.motion.is_moving();
        self.ctx.cycle = cycle.wrapping_add(1);
        debug!(
            "cycle {} slept {} ms, moving {}",
            cycle,
            slept_ms,
            report.moving
        );
        report
    }

    async fn sensor_cycle(&mut self, report: &mut CycleReport) {
        let listening = self.ctx.motion.is_moving();
        let warm = self.ctx.motion.is_warm();

        if listening && self.hw.radio.set_receive_mode(true).is_err() {
            warn!("radio rx mode failed");
        }
        if self.hw.accel.power(true).is_err() {
            warn!("accelerometer power up failed");
        }
        if listening {
            self.hw.radio.chip_enable(true).ok();
        }

        self.hw.delay.delay_ms(ACC_SETTLE_MS).await;
        let sample = self.hw.accel.read();
        self.hw.accel.power(false).ok();

        if listening {
            self.hw.radio.chip_enable(false).ok();
        }

        if listening || !warm {
            let on_ms = if warm { RX_BLINK_MS } else { WARMUP_BLINK_MS };
            blink(&mut self.hw.indicator, &mut self.hw.delay, on_ms).await;
        }
        if !warm {
            self.hw.delay.delay_ms(WARMUP_BLINK_MS).await;
            blink(&mut self.hw.indicator, &mut self.hw.delay, WARMUP_BLINK_MS).await;
        }

        if listening {
            self.hw.radio.set_receive_mode(false).ok();
        }

        match sample {
            Ok(sample) => {
                self.ctx.motion.observe(sample);
            }
            Err(_) => warn!("accelerometer read failed"),
        }

        if self.ctx.motion.is_moving() && self.hw.radio.irq_pending() {
            self.drain_receiver(report).await;
        }
        if self.hw.radio.clear_interrupts().is_err() {
            warn!("radio irq clear failed");
        }
    }

    async fn drain_receiver(&mut self, report: &mut CycleReport) {
        for _ in 0..MAX_FRAMES_PER_DRAIN {
            let frame = match self.hw.radio.read_frame() {
                Ok(frame) => frame,
                Err(_) => {
                    warn!("radio frame read failed");
                    break;
                }
            };
            report.frames_received += 1;

            match verify(&frame, &self.cipher, &mut self.ctx.peers) {
                Ok(packet) => {
                    if self.store(packet) {
                        report.frames_logged += 1;
                        blink(&mut self.hw.indicator, &mut self.hw.delay, RX_BLINK_MS).await;
                    }
                }
                Err(reason) => debug!("frame dropped: {}", reason.as_str()),
            }

            if self.hw.radio.fifo_empty().unwrap_or(true) {
                break;
            }
        }
    }

    fn store(&mut self, packet: BeaconPacket) -> bool {
        let entry = LogEntry::beacon(packet, self.hw.clock.ticks());
        match self.log.append(&entry) {
            Ok(_) => true,
            Err(LogError::StorageFull) => {
                if !self.storage_full_reported {
                    warn!("log storage full, receptions no longer stored");
                    self.storage_full_reported = true;
                }
                false
            }
            Err(_) => {
                warn!("log append failed");
                false
            }
        }
    }

    async fn transmit_cycle(&mut self) {
        let strength = TxStrength::for_cycle(self.ctx.cycle);
        self.ctx.radio.tx_power = strength;

        if self.hw.radio.set_receive_mode(false).is_err() {
            warn!("radio power up failed");
            return;
        }

        let packet = BeaconPacket::encode(
            &self.ctx.identity,
            strength,
            self.ctx.motion.is_moving(),
            self.hw.clock.ticks(),
            &self.ctx.peers,
        );
        let frame = packet.encrypt(&self.cipher);

        if self.hw.radio.set_power(strength.power_level()).is_err()
            || self.hw.radio.transmit(&frame).is_err()
        {
            warn!("beacon upload failed");
            return;
        }

        self.hw.radio.chip_enable(true).ok();
        self.hw.delay.delay_ms(TX_SETTLE_MS).await;
        self.hw.radio.chip_enable(false).ok();
    }

    pub fn context(&self) -> &TagContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut TagContext {
        &mut self.ctx
    }

    pub fn hardware(&self) -> &TagHardware<A, R, I, K, D> {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut TagHardware<A, R, I, K, D> {
        &mut self.hw
    }

    pub fn log(&self) -> &LogWriter<S, C> {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut LogWriter<S, C> {
        &mut self.log
    }
}
