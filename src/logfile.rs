// Append-only beacon log
//
// Fixed 24-byte entries laid end to end from offset 0:
//
//   0      entry kind (1 = received beacon)
//   1      entry size (24)
//   2..4   reserved, zero
//   4..8   capture time (u32 BE)
//   8..22  beacon bytes 0..14
//   22..24 crc16 over entry bytes 0..22 (replaces the beacon's own CRC)
//
// The write cursor lives outside the log in reset-surviving memory and is
// only advanced once the storage write has returned success.

use core::fmt;

use crate::beacon::{BeaconPacket, BEACON_CRC_OFFSET, BEACON_SIZE};
use crate::crc16;
use crate::drivers::{CursorStore, Storage};
use crate::{debug, info, warn};

pub const LOG_ENTRY_SIZE: usize = 8 + BEACON_SIZE;
const ENTRY_CRC_OFFSET: usize = LOG_ENTRY_SIZE - 2;
const ENTRY_SIZE_U32: u32 = LOG_ENTRY_SIZE as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LogEntryKind {
    BeaconPacket = 1,
}

impl LogEntryKind {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::BeaconPacket),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: LogEntryKind,
    pub time: u32,
    pub packet: BeaconPacket,
}

impl LogEntry {
    /// Wraps a verified reception captured at `time`.
    pub fn beacon(packet: BeaconPacket, time: u32) -> Self {
        Self {
            kind: LogEntryKind::BeaconPacket,
            time,
            packet,
        }
    }

    pub fn to_bytes(&self) -> [u8; LOG_ENTRY_SIZE] {
        let mut buf = [0u8; LOG_ENTRY_SIZE];
        buf[0] = self.kind as u8;
        buf[1] = LOG_ENTRY_SIZE as u8;
        buf[4..8].copy_from_slice(&self.time.to_be_bytes());
        buf[8..8 + BEACON_CRC_OFFSET].copy_from_slice(&self.packet.to_bytes()[..BEACON_CRC_OFFSET]);

        let crc = crc16(&buf[..ENTRY_CRC_OFFSET]);
        buf[ENTRY_CRC_OFFSET..].copy_from_slice(&crc.to_be_bytes());
        buf
    }

    /// Decodes a stored entry, `None` if the envelope does not check out.
    pub fn from_bytes(buf: &[u8; LOG_ENTRY_SIZE]) -> Option<Self> {
        let stored = u16::from_be_bytes([buf[ENTRY_CRC_OFFSET], buf[ENTRY_CRC_OFFSET + 1]]);
        if crc16(&buf[..ENTRY_CRC_OFFSET]) != stored || buf[1] as usize != LOG_ENTRY_SIZE {
            return None;
        }
        let kind = LogEntryKind::from_raw(buf[0])?;

        let mut frame = [0u8; BEACON_SIZE];
        frame.copy_from_slice(&buf[8..]);
        Some(Self {
            kind,
            time: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            packet: BeaconPacket::from_bytes_unchecked(&frame),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogError<E> {
    /// The next entry would run past the end of the log region.
    StorageFull,
    NoSuchEntry,
    Corrupt,
    Storage(E),
}

impl<E: fmt::Debug> fmt::Display for LogError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFull => f.write_str("log storage full"),
            Self::NoSuchEntry => f.write_str("no such log entry"),
            Self::Corrupt => f.write_str("log entry failed its checksum"),
            Self::Storage(e) => write!(f, "storage error: {e:?}"),
        }
    }
}

pub struct LogWriter<S, C> {
    storage: S,
    cursor_store: C,
    cursor: u32,
}

impl<S: Storage, C: CursorStore> LogWriter<S, C> {
    /// Resumes at the persisted cursor. A cursor that cannot have been written
    /// by this writer (misaligned or past the end) means the backing memory
    /// came up uninitialised; the log is erased and restarted at 0.
    pub fn restore(storage: S, cursor_store: C) -> Result<Self, LogError<S::Error>> {
        let cursor = cursor_store.load();
        let mut log = Self {
            storage,
            cursor_store,
            cursor,
        };

        if cursor % ENTRY_SIZE_U32 != 0 || cursor > log.storage.capacity() {
            warn!("log cursor {} invalid, erasing storage", cursor);
            log.erase()?;
        } else {
            log.skip_programmed_slots()?;
            info!("log resumed at {} ({} entries)", log.cursor, log.len());
        }
        Ok(log)
    }

    /// A reset between a slot write and the cursor update leaves the cursor on
    /// a programmed slot. Flash can only clear bits, so writing over it would
    /// corrupt both entries; step past anything that is not blank instead.
    fn skip_programmed_slots(&mut self) -> Result<(), LogError<S::Error>> {
        let capacity = self.storage.capacity();
        let start = self.cursor;
        let mut slot = [0u8; LOG_ENTRY_SIZE];
        while self.cursor + ENTRY_SIZE_U32 <= capacity {
            self.storage
                .read(self.cursor, &mut slot)
                .map_err(LogError::Storage)?;
            if slot.iter().all(|&b| b == 0xFF) {
                break;
            }
            self.cursor += ENTRY_SIZE_U32;
        }
        if self.cursor != start {
            warn!("log cursor {} behind storage, moved to {}", start, self.cursor);
            self.cursor_store.store(self.cursor);
        }
        Ok(())
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Stored entries.
    pub fn len(&self) -> u32 {
        self.cursor / ENTRY_SIZE_U32
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn capacity(&self) -> u32 {
        self.storage.capacity()
    }

    /// Writes `entry` at the cursor and returns the advanced cursor.
    pub fn append(&mut self, entry: &LogEntry) -> Result<u32, LogError<S::Error>> {
        let next = self
            .cursor
            .checked_add(ENTRY_SIZE_U32)
            .filter(|&end| end <= self.storage.capacity())
            .ok_or(LogError::StorageFull)?;

        self.storage
            .write(self.cursor, &entry.to_bytes())
            .map_err(LogError::Storage)?;

        self.cursor = next;
        self.cursor_store.store(next);
        debug!("log append, cursor {}", next);
        Ok(next)
    }

    pub fn read_entry(&mut self, index: u32) -> Result<LogEntry, LogError<S::Error>> {
        if index >= self.len() {
            return Err(LogError::NoSuchEntry);
        }
        let mut buf = [0u8; LOG_ENTRY_SIZE];
        self.storage
            .read(index * ENTRY_SIZE_U32, &mut buf)
            .map_err(LogError::Storage)?;
        LogEntry::from_bytes(&buf).ok_or(LogError::Corrupt)
    }

    /// Wipes the whole region; the only way the cursor ever moves backwards.
    pub fn erase(&mut self) -> Result<(), LogError<S::Error>> {
        self.storage.erase().map_err(LogError::Storage)?;
        self.cursor = 0;
        self.cursor_store.store(0);
        Ok(())
    }

    /// Raw access for the diagnostic console. Writes made through it bypass
    /// the cursor.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}
