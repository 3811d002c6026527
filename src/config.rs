// Beacon tag timing, protocol and storage configuration

// ---------------------------------------------------------------------------
// Duty cycle (milliseconds)
// ---------------------------------------------------------------------------
pub const SLEEP_MOVING_MS: u32 = 50; // + jitter → 50-150 ms
pub const SLEEP_STILL_MS: u32 = 1550; // + jitter → 1550-1650 ms
pub const SLEEP_JITTER_MS: u32 = 100;
pub const ACC_SETTLE_MS: u32 = 20;
pub const TX_SETTLE_MS: u32 = 2;
pub const RX_BLINK_MS: u32 = 2;
pub const WARMUP_BLINK_MS: u32 = 100;
pub const READY_BLINK_MS: u32 = 1000;
pub const FAILURE_BLINK_MS: u32 = 500;

/// A still tag reads its accelerometer on every 16th cycle only.
pub const STILL_SENSOR_CYCLE_MASK: u32 = 0x0F;

/// Upper bound on frames pulled out of the radio in one receive drain.
pub const MAX_FRAMES_PER_DRAIN: usize = 32;

// ---------------------------------------------------------------------------
// Motion detection
// ---------------------------------------------------------------------------
pub const MOTION_FIFO_DEPTH: usize = 10;
pub const MOTION_THRESHOLD: i32 = 3;
pub const MOTION_TICKS_MAX: u8 = 20;

// ---------------------------------------------------------------------------
// Beacon protocol
// ---------------------------------------------------------------------------
pub const PROTO_BEACON_TRACKER: u8 = 23;
pub const FLAG_MOVING: u8 = 0x02;
pub const TX_STRENGTH_OFFSET: u8 = 2;

pub const RADIO_CHANNEL: u8 = 81;
pub const BROADCAST_MAC: [u8; 5] = [1, 2, 3, 2, 1];

/// Default XXTEA key of the tag. Change per deployment.
pub const DEFAULT_KEY: [u32; 4] = [0x0011_2233, 0x4455_6677, 0x8899_AABB, 0xCCDD_EEFF];

// ---------------------------------------------------------------------------
// Log storage
// ---------------------------------------------------------------------------
pub const LOG_STORAGE_SIZE: u32 = 2 * 1024 * 1024; // 16 Mbit SPI NOR

/// Runtime knobs handed to the scheduler; `Default` mirrors the constants above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagConfig {
    pub key: [u32; 4],
    pub radio: RadioConfig,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY,
            radio: RadioConfig::default(),
        }
    }
}

/// Coarse transmit power class embedded in every beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStrength {
    Low,
    High,
}

impl TxStrength {
    /// Even cycles transmit low, odd cycles high.
    pub fn for_cycle(cycle: u32) -> Self {
        if cycle & 1 == 0 {
            Self::Low
        } else {
            Self::High
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Low => TX_STRENGTH_OFFSET,
            Self::High => TX_STRENGTH_OFFSET + 1,
        }
    }

    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            TX_STRENGTH_OFFSET => Some(Self::Low),
            r if r == TX_STRENGTH_OFFSET + 1 => Some(Self::High),
            _ => None,
        }
    }

    /// Radio PA level (0-3) used while sending a beacon of this class.
    pub fn power_level(self) -> u8 {
        self.to_wire() & 0x03
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioConfig {
    pub mac: [u8; 5],
    pub channel: u8,
    pub tx_power: TxStrength,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            mac: BROADCAST_MAC,
            channel: RADIO_CHANNEL,
            tx_power: TxStrength::High,
        }
    }
}
