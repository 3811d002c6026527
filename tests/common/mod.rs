#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;

use embedded_hal_async::delay::DelayNs;
use esp_beacon_tag::beacon::{BeaconPacket, DeviceIdentity, PeerStats, BEACON_SIZE};
use esp_beacon_tag::cipher::Xxtea;
use esp_beacon_tag::config::{RadioConfig, TagConfig, TxStrength, DEFAULT_KEY};
use esp_beacon_tag::drivers::{Accelerometer, Clock, CursorStore, Indicator, Radio, Storage};
use esp_beacon_tag::logfile::LogWriter;
use esp_beacon_tag::motion::MotionSample;
use esp_beacon_tag::scheduler::{Scheduler, TagHardware};

pub const REST: MotionSample = MotionSample::new(0, 0, 64);
pub const SPIKE: MotionSample = MotionSample::new(20, 0, 64);

pub fn identity() -> DeviceIdentity {
    DeviceIdentity::new([0x1234_5678, 0x9ABC_DEF0, 0x0F1E_2D3C, 0x4B5A_6978])
}

pub fn peer() -> DeviceIdentity {
    DeviceIdentity::new([0xCAFE_F00D, 1, 2, 3])
}

/// A frame as another tag would put it on air.
pub fn peer_frame(strength: TxStrength, seq: u32) -> [u8; BEACON_SIZE] {
    BeaconPacket::encode(&peer(), strength, false, seq, &PeerStats::default())
        .encrypt(&Xxtea::new(DEFAULT_KEY))
}

// ── accelerometer ───────────────────────────────────────────────────────────

pub struct MockAccel {
    pub queued: VecDeque<MotionSample>,
    pub resting: MotionSample,
    pub fail_reads: bool,
    pub powered: bool,
    pub reads: u32,
}

impl MockAccel {
    pub fn new() -> Self {
        Self {
            queued: VecDeque::new(),
            resting: REST,
            fail_reads: false,
            powered: false,
            reads: 0,
        }
    }
}

impl Accelerometer for MockAccel {
    type Error = ();

    fn power(&mut self, on: bool) -> Result<(), ()> {
        self.powered = on;
        Ok(())
    }

    fn read(&mut self) -> Result<MotionSample, ()> {
        assert!(self.powered, "read while powered down");
        self.reads += 1;
        if self.fail_reads {
            return Err(());
        }
        Ok(self.queued.pop_front().unwrap_or(self.resting))
    }
}

// ── radio ───────────────────────────────────────────────────────────────────

pub struct MockRadio {
    pub init_fails: bool,
    pub config: Option<RadioConfig>,
    pub power_level: u8,
    pub rx_mode: bool,
    pub ce: bool,
    pub bus_up: bool,
    pub loaded: Option<[u8; BEACON_SIZE]>,
    /// Frames sent on air together with the PA level at the time.
    pub sent: Vec<([u8; BEACON_SIZE], u8)>,
    pub rx_fifo: VecDeque<[u8; BEACON_SIZE]>,
    pub irq_clears: u32,
    pub power_downs: u32,
}

impl MockRadio {
    pub fn new() -> Self {
        Self {
            init_fails: false,
            config: None,
            power_level: 0,
            rx_mode: false,
            ce: false,
            bus_up: false,
            loaded: None,
            sent: Vec::new(),
            rx_fifo: VecDeque::new(),
            irq_clears: 0,
            power_downs: 0,
        }
    }
}

impl Radio for MockRadio {
    type Error = ();

    fn init(&mut self, config: &RadioConfig) -> Result<(), ()> {
        if self.init_fails {
            return Err(());
        }
        self.config = Some(*config);
        Ok(())
    }

    fn set_power(&mut self, level: u8) -> Result<(), ()> {
        self.power_level = level;
        Ok(())
    }

    fn set_receive_mode(&mut self, on: bool) -> Result<(), ()> {
        assert!(self.bus_up);
        self.rx_mode = on;
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8; BEACON_SIZE]) -> Result<(), ()> {
        assert!(!self.rx_mode);
        self.loaded = Some(*frame);
        Ok(())
    }

    fn chip_enable(&mut self, on: bool) -> Result<(), ()> {
        // falling CE edge after an upload puts the frame on air
        if self.ce && !on && !self.rx_mode {
            if let Some(frame) = self.loaded.take() {
                self.sent.push((frame, self.power_level));
            }
        }
        self.ce = on;
        Ok(())
    }

    fn irq_pending(&mut self) -> bool {
        !self.rx_fifo.is_empty()
    }

    fn read_frame(&mut self) -> Result<[u8; BEACON_SIZE], ()> {
        self.rx_fifo.pop_front().ok_or(())
    }

    fn fifo_empty(&mut self) -> Result<bool, ()> {
        Ok(self.rx_fifo.is_empty())
    }

    fn clear_interrupts(&mut self) -> Result<(), ()> {
        self.irq_clears += 1;
        Ok(())
    }

    fn power_down(&mut self) -> Result<(), ()> {
        self.ce = false;
        self.rx_mode = false;
        self.power_downs += 1;
        Ok(())
    }

    fn resume_bus(&mut self) {
        self.bus_up = true;
    }

    fn suspend_bus(&mut self) {
        self.bus_up = false;
    }
}

// ── storage ─────────────────────────────────────────────────────────────────

pub struct RamStorage {
    pub mem: Vec<u8>,
    pub erases: u32,
}

impl RamStorage {
    pub fn new(size: usize) -> Self {
        Self {
            mem: vec![0xFF; size],
            erases: 0,
        }
    }
}

impl Storage for RamStorage {
    type Error = ();

    fn capacity(&self) -> u32 {
        self.mem.len() as u32
    }
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), ()> {
        let at = offset as usize;
        let cells = self.mem.get_mut(at..at + data.len()).ok_or(())?;
        for (cell, byte) in cells.iter_mut().zip(data) {
            *cell &= byte;
        }
        Ok(())
    }
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), ()> {
        let at = offset as usize;
        buf.copy_from_slice(self.mem.get(at..at + buf.len()).ok_or(())?);
        Ok(())
    }
    fn erase(&mut self) -> Result<(), ()> {
        self.mem.fill(0xFF);
        self.erases += 1;
        Ok(())
    }
    fn status(&mut self) -> Result<u8, ()> {
        Ok(0)
    }
}

pub struct RamCursor(pub u32);

impl CursorStore for RamCursor {
    fn load(&self) -> u32 {
        self.0
    }
    fn store(&mut self, offset: u32) {
        self.0 = offset;
    }
}

// ── indicator, clock, delay ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLed {
    pub on: bool,
    pub blinks: u32,
}

impl Indicator for MockLed {
    fn set(&mut self, on: bool) {
        if on && !self.on {
            self.blinks += 1;
        }
        self.on = on;
    }
}

/// Advances by 1000 ticks every time it is read.
#[derive(Default)]
pub struct MockClock {
    pub now: Cell<u32>,
}

impl Clock for MockClock {
    fn ticks(&self) -> u32 {
        let t = self.now.get();
        self.now.set(t.wrapping_add(1000));
        t
    }
}

#[derive(Default)]
pub struct RecordingDelay {
    pub waits_ms: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.waits_ms.push(ns / 1_000_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.waits_ms.push(ms);
    }
}

// ── assembled tag ───────────────────────────────────────────────────────────

pub type TestScheduler = Scheduler<
    MockAccel,
    MockRadio,
    RamStorage,
    RamCursor,
    MockLed,
    MockClock,
    RecordingDelay,
>;

pub fn tag_with_storage(storage: RamStorage, cursor: u32) -> TestScheduler {
    let hw = TagHardware {
        accel: MockAccel::new(),
        radio: MockRadio::new(),
        indicator: MockLed::default(),
        clock: MockClock::default(),
        delay: RecordingDelay::default(),
    };
    let log = LogWriter::restore(storage, RamCursor(cursor)).unwrap();
    Scheduler::new(TagConfig::default(), identity(), hw, log)
}

pub fn tag() -> TestScheduler {
    tag_with_storage(RamStorage::new(64 * 1024), 0)
}

/// Fills the motion filter with resting samples so classification is live.
pub fn warm_up(tag: &mut TestScheduler) {
    let motion = &mut tag.context_mut().motion;
    while !motion.is_warm() {
        motion.observe(REST);
    }
}
