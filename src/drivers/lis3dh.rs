// LIS3DH accelerometer over I2C.
//
// Powered up at 100 Hz only for the duration of a sample; readings are the
// high byte of each 16-bit output register.

use embedded_hal::i2c::I2c;

use super::Accelerometer;
use crate::motion::MotionSample;

pub const LIS3DH_ADDR: u8 = 0x18;

const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL_REG1: u8 = 0x20;
const REG_CTRL_REG4: u8 = 0x23;
const REG_OUT_X_L: u8 = 0x28;
const AUTO_INCREMENT: u8 = 0x80;
const WHO_AM_I_EXPECTED: u8 = 0x33;

const CTRL1_100HZ_XYZ: u8 = 0x57;
const CTRL1_POWER_DOWN: u8 = 0x07;
const CTRL4_BDU: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccelError {
    Bus,
    WrongDevice(u8),
}

pub struct Lis3dh<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C: I2c> Lis3dh<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            addr: LIS3DH_ADDR,
        }
    }

    pub fn with_address(i2c: I2C, addr: u8) -> Self {
        Self { i2c, addr }
    }

    /// Probe the device and leave it powered down with block data update on.
    pub fn init(&mut self) -> Result<(), AccelError> {
        let mut id = [0u8; 1];
        self.i2c
            .write_read(self.addr, &[REG_WHO_AM_I], &mut id)
            .map_err(|_| AccelError::Bus)?;
        if id[0] != WHO_AM_I_EXPECTED {
            return Err(AccelError::WrongDevice(id[0]));
        }

        self.write_reg(REG_CTRL_REG4, CTRL4_BDU)?;
        self.write_reg(REG_CTRL_REG1, CTRL1_POWER_DOWN)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), AccelError> {
        self.i2c
            .write(self.addr, &[reg, value])
            .map_err(|_| AccelError::Bus)
    }
}

impl<I2C: I2c> Accelerometer for Lis3dh<I2C> {
    type Error = AccelError;

    fn power(&mut self, on: bool) -> Result<(), AccelError> {
        let ctrl = if on { CTRL1_100HZ_XYZ } else { CTRL1_POWER_DOWN };
        self.write_reg(REG_CTRL_REG1, ctrl)
    }

    fn read(&mut self) -> Result<MotionSample, AccelError> {
        let mut raw = [0u8; 6];
        self.i2c
            .write_read(self.addr, &[REG_OUT_X_L | AUTO_INCREMENT], &mut raw)
            .map_err(|_| AccelError::Bus)?;

        // little-endian, left-justified; keep the high byte
        Ok(MotionSample {
            x: raw[1] as i8 as i32,
            y: raw[3] as i8 as i32,
            z: raw[5] as i8 as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    struct FakeBus {
        regs: [u8; 0x40],
        writes: Vec<(u8, u8)>,
    }

    impl FakeBus {
        fn new() -> Self {
            Self {
                regs: [0; 0x40],
                writes: Vec::new(),
            }
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            assert_eq!(address, LIS3DH_ADDR);
            let mut reg = 0usize;
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        reg = (bytes[0] & !AUTO_INCREMENT) as usize;
                        if let Some(&value) = bytes.get(1) {
                            self.regs[reg] = value;
                            self.writes.push((bytes[0], value));
                        }
                    }
                    Operation::Read(buf) => {
                        for (i, b) in buf.iter_mut().enumerate() {
                            *b = self.regs[reg + i];
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn init_checks_identity() {
        let mut bus = FakeBus::new();
        bus.regs[REG_WHO_AM_I as usize] = 0x32;
        let mut accel = Lis3dh::new(bus);
        assert_eq!(accel.init(), Err(AccelError::WrongDevice(0x32)));
    }

    #[test]
    fn power_toggles_data_rate() {
        let mut bus = FakeBus::new();
        bus.regs[REG_WHO_AM_I as usize] = WHO_AM_I_EXPECTED;
        let mut accel = Lis3dh::new(bus);
        accel.init().unwrap();
        accel.power(true).unwrap();
        accel.power(false).unwrap();
        assert_eq!(
            accel.i2c.writes,
            vec![
                (REG_CTRL_REG4, CTRL4_BDU),
                (REG_CTRL_REG1, CTRL1_POWER_DOWN),
                (REG_CTRL_REG1, CTRL1_100HZ_XYZ),
                (REG_CTRL_REG1, CTRL1_POWER_DOWN),
            ]
        );
    }

    #[test]
    fn read_keeps_signed_high_bytes() {
        let mut bus = FakeBus::new();
        let base = REG_OUT_X_L as usize;
        bus.regs[base..base + 6].copy_from_slice(&[0xC0, 0x05, 0x00, 0xFB, 0x80, 0x40]);
        let mut accel = Lis3dh::new(bus);
        assert_eq!(accel.read().unwrap(), MotionSample::new(5, -5, 64));
    }
}
