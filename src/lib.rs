#![cfg_attr(not(test), no_std)]

pub mod beacon;
pub mod cipher;
pub mod config;
pub mod console;
pub mod drivers;
pub mod hal;
pub mod jitter;
pub mod led;
pub mod logfile;
pub mod motion;
pub mod scheduler;
#[cfg(feature = "esp32c6")]
pub mod tasks;

#[cfg(feature = "defmt")]
#[allow(unused_imports)]
use defmt::{debug, error, info, warn};

#[cfg(not(feature = "defmt"))]
#[allow(unused_imports)]
use log::{debug, error, info, warn};

// CRC-16/CCITT (poly 0x1021, init 0xFFFF), byte-wise without a table
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc = crc.rotate_left(8);
        crc ^= byte as u16;
        crc ^= (crc & 0xFF) >> 4;
        crc ^= crc << 12;
        crc ^= (crc & 0xFF) << 5;
    }
    crc
}
