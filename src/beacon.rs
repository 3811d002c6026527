// Beacon packet codec
//
// 16-byte tracker frame, big-endian fields, CRC16 over the first 14 bytes:
//
//   0      protocol
//   1..3   object id (tag id of the sender)
//   3      flags
//   4      tx strength class
//   5..9   sequence (sender timer snapshot)
//   9..11  last peer id the sender heard
//   11     peers heard at low strength
//   12     peers heard at high strength
//   13     battery
//   14..16 crc16
//
// The checksum always covers plaintext: frames are encrypted right before
// they go to the radio and decrypted right after they come out of it.

use core::fmt;

use crate::cipher::{BlockCipher, CIPHER_FRAME_SIZE};
use crate::config::{TxStrength, FLAG_MOVING, PROTO_BEACON_TRACKER};
use crate::crc16;

pub const BEACON_SIZE: usize = CIPHER_FRAME_SIZE;
pub(crate) const BEACON_CRC_OFFSET: usize = BEACON_SIZE - 2;

/// Factory UID of the tag and the 16-bit id derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    uid: [u32; 4],
    tag_id: u16,
}

impl DeviceIdentity {
    pub fn new(uid: [u32; 4]) -> Self {
        let mut raw = [0u8; 16];
        for (chunk, word) in raw.chunks_exact_mut(4).zip(uid.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Self {
            uid,
            tag_id: crc16(&raw),
        }
    }

    /// Builds the UID from up to 16 raw bytes (e.g. an eFuse MAC), zero padded.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 16];
        let n = bytes.len().min(raw.len());
        raw[..n].copy_from_slice(&bytes[..n]);

        let mut uid = [0u32; 4];
        for (word, chunk) in uid.iter_mut().zip(raw.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self::new(uid)
    }

    pub fn uid(&self) -> [u32; 4] {
        self.uid
    }

    pub fn tag_id(&self) -> u16 {
        self.tag_id
    }

    /// Jitter seed: all UID words folded together.
    pub fn seed(&self) -> u32 {
        self.uid[0] ^ self.uid[1] ^ self.uid[2] ^ self.uid[3]
    }
}

/// What this tag has heard from its neighbours; echoed in every beacon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStats {
    pub last_seen: u16,
    pub seen_low: u8,
    pub seen_high: u8,
}

impl PeerStats {
    pub fn record(&mut self, packet: &BeaconPacket) {
        self.last_seen = packet.oid;
        match packet.strength() {
            Some(TxStrength::Low) => self.seen_low = self.seen_low.wrapping_add(1),
            Some(TxStrength::High) => self.seen_high = self.seen_high.wrapping_add(1),
            None => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rejected {
    FrameLength,
    Checksum,
    Protocol,
}

impl Rejected {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrameLength => "bad frame length",
            Self::Checksum => "crc mismatch",
            Self::Protocol => "foreign protocol",
        }
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeaconPacket {
    pub proto: u8,
    pub oid: u16,
    pub flags: u8,
    pub strength: u8,
    pub seq: u32,
    pub oid_last_seen: u16,
    pub seen_low: u8,
    pub seen_high: u8,
    pub battery: u8,
}

impl BeaconPacket {
    pub fn encode(
        identity: &DeviceIdentity,
        strength: TxStrength,
        moving: bool,
        seq: u32,
        peers: &PeerStats,
    ) -> Self {
        Self {
            proto: PROTO_BEACON_TRACKER,
            oid: identity.tag_id(),
            flags: if moving { FLAG_MOVING } else { 0 },
            strength: strength.to_wire(),
            seq,
            oid_last_seen: peers.last_seen,
            seen_low: peers.seen_low,
            seen_high: peers.seen_high,
            battery: 0,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.flags & FLAG_MOVING != 0
    }

    pub fn strength(&self) -> Option<TxStrength> {
        TxStrength::from_wire(self.strength)
    }

    /// Serialised plaintext frame including the trailing CRC.
    pub fn to_bytes(&self) -> [u8; BEACON_SIZE] {
        let mut buf = [0u8; BEACON_SIZE];
        buf[0] = self.proto;
        buf[1..3].copy_from_slice(&self.oid.to_be_bytes());
        buf[3] = self.flags;
        buf[4] = self.strength;
        buf[5..9].copy_from_slice(&self.seq.to_be_bytes());
        buf[9..11].copy_from_slice(&self.oid_last_seen.to_be_bytes());
        buf[11] = self.seen_low;
        buf[12] = self.seen_high;
        buf[13] = self.battery;

        let crc = crc16(&buf[..BEACON_CRC_OFFSET]);
        buf[BEACON_CRC_OFFSET..].copy_from_slice(&crc.to_be_bytes());
        buf
    }

    /// Field decode without any integrity check; the CRC bytes are ignored.
    pub(crate) fn from_bytes_unchecked(buf: &[u8; BEACON_SIZE]) -> Self {
        Self {
            proto: buf[0],
            oid: u16::from_be_bytes([buf[1], buf[2]]),
            flags: buf[3],
            strength: buf[4],
            seq: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]),
            oid_last_seen: u16::from_be_bytes([buf[9], buf[10]]),
            seen_low: buf[11],
            seen_high: buf[12],
            battery: buf[13],
        }
    }

    /// Plaintext decode: CRC first, then the protocol tag.
    pub fn parse(buf: &[u8; BEACON_SIZE]) -> Result<Self, Rejected> {
        let expected = u16::from_be_bytes([buf[BEACON_CRC_OFFSET], buf[BEACON_CRC_OFFSET + 1]]);
        if crc16(&buf[..BEACON_CRC_OFFSET]) != expected {
            return Err(Rejected::Checksum);
        }
        let packet = Self::from_bytes_unchecked(buf);
        if packet.proto != PROTO_BEACON_TRACKER {
            return Err(Rejected::Protocol);
        }
        Ok(packet)
    }

    /// Ready-to-send radio frame.
    pub fn encrypt<C: BlockCipher>(&self, cipher: &C) -> [u8; BEACON_SIZE] {
        let mut frame = self.to_bytes();
        cipher.encrypt_frame(&mut frame);
        frame
    }
}

/// Decrypts and checks a received frame. Accepted packets are folded into
/// `peers` before being handed back; rejected ones leave `peers` untouched.
pub fn verify<C: BlockCipher>(
    frame: &[u8],
    cipher: &C,
    peers: &mut PeerStats,
) -> Result<BeaconPacket, Rejected> {
    let mut buf: [u8; BEACON_SIZE] = frame.try_into().map_err(|_| Rejected::FrameLength)?;
    cipher.decrypt_frame(&mut buf);

    let packet = BeaconPacket::parse(&buf)?;
    peers.record(&packet);
    Ok(packet)
}
