// JEDEC SPI NOR flash (W25Qxx / AT25 style command set).
//
// Byte-addressed reads, page-program writes split on 256-byte page
// boundaries, whole-chip erase. Busy polling uses the blocking delay.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};

use super::Storage;

const CMD_READ: u8 = 0x03;
const CMD_PAGE_PROGRAM: u8 = 0x02;
const CMD_WRITE_ENABLE: u8 = 0x06;
const CMD_READ_STATUS: u8 = 0x05;
const CMD_CHIP_ERASE: u8 = 0xC7;

const STATUS_BUSY: u8 = 0x01;

pub const PAGE_SIZE: u32 = 256;

const POLL_INTERVAL_US: u32 = 50;
const PROGRAM_TIMEOUT_US: u32 = 10_000;
const ERASE_TIMEOUT_US: u32 = 120_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    Spi,
    OutOfRange,
    Timeout,
}

pub struct SpiFlash<SPI, D> {
    spi: SPI,
    delay: D,
    capacity: u32,
}

impl<SPI: SpiDevice, D: DelayNs> SpiFlash<SPI, D> {
    pub fn new(spi: SPI, delay: D, capacity: u32) -> Self {
        Self {
            spi,
            delay,
            capacity,
        }
    }

    fn address(cmd: u8, offset: u32) -> [u8; 4] {
        let a = offset.to_be_bytes();
        [cmd, a[1], a[2], a[3]]
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<(), FlashError> {
        match offset.checked_add(len as u32) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(FlashError::OutOfRange),
        }
    }

    fn write_enable(&mut self) -> Result<(), FlashError> {
        self.spi
            .write(&[CMD_WRITE_ENABLE])
            .map_err(|_| FlashError::Spi)
    }

    fn read_status(&mut self) -> Result<u8, FlashError> {
        let mut buf = [CMD_READ_STATUS, 0];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(|_| FlashError::Spi)?;
        Ok(buf[1])
    }

    fn wait_ready(&mut self, timeout_us: u32) -> Result<(), FlashError> {
        let mut waited = 0;
        while self.read_status()? & STATUS_BUSY != 0 {
            if waited >= timeout_us {
                return Err(FlashError::Timeout);
            }
            self.delay.delay_us(POLL_INTERVAL_US);
            waited += POLL_INTERVAL_US;
        }
        Ok(())
    }
}

impl<SPI: SpiDevice, D: DelayNs> Storage for SpiFlash<SPI, D> {
    type Error = FlashError;

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        self.check_range(offset, data.len())?;

        let mut offset = offset;
        let mut rest = data;
        while !rest.is_empty() {
            let room = (PAGE_SIZE - offset % PAGE_SIZE) as usize;
            let (chunk, tail) = rest.split_at(room.min(rest.len()));

            self.write_enable()?;
            let header = Self::address(CMD_PAGE_PROGRAM, offset);
            self.spi
                .transaction(&mut [Operation::Write(&header), Operation::Write(chunk)])
                .map_err(|_| FlashError::Spi)?;
            self.wait_ready(PROGRAM_TIMEOUT_US)?;

            offset += chunk.len() as u32;
            rest = tail;
        }
        Ok(())
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        self.check_range(offset, buf.len())?;
        let header = Self::address(CMD_READ, offset);
        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Read(buf)])
            .map_err(|_| FlashError::Spi)
    }

    fn erase(&mut self) -> Result<(), FlashError> {
        self.write_enable()?;
        self.spi
            .write(&[CMD_CHIP_ERASE])
            .map_err(|_| FlashError::Spi)?;
        self.wait_ready(ERASE_TIMEOUT_US)
    }

    fn status(&mut self) -> Result<u8, FlashError> {
        self.read_status()
    }
}
