// nRF24L01+ transceiver over SPI.
//
// Broadcast beacons only: auto-ack and retransmits are off, pipe 0 listens
// on the same address it transmits to, payloads are a static BEACON_SIZE.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{Operation, SpiDevice};

use super::Radio;
use crate::beacon::BEACON_SIZE;
use crate::config::RadioConfig;

// Commands
const R_REGISTER: u8 = 0x00;
const W_REGISTER: u8 = 0x20;
const R_RX_PAYLOAD: u8 = 0x61;
const W_TX_PAYLOAD: u8 = 0xA0;
const FLUSH_TX: u8 = 0xE1;
const FLUSH_RX: u8 = 0xE2;
const NOP: u8 = 0xFF;

// Registers
const REG_CONFIG: u8 = 0x00;
const REG_EN_AA: u8 = 0x01;
const REG_EN_RXADDR: u8 = 0x02;
const REG_SETUP_AW: u8 = 0x03;
const REG_SETUP_RETR: u8 = 0x04;
const REG_RF_CH: u8 = 0x05;
const REG_RF_SETUP: u8 = 0x06;
const REG_STATUS: u8 = 0x07;
const REG_RX_ADDR_P0: u8 = 0x0A;
const REG_TX_ADDR: u8 = 0x10;
const REG_RX_PW_P0: u8 = 0x11;
const REG_FIFO_STATUS: u8 = 0x17;

const CONFIG_EN_CRC: u8 = 1 << 3;
const CONFIG_CRCO: u8 = 1 << 2;
const CONFIG_PWR_UP: u8 = 1 << 1;
const CONFIG_PRIM_RX: u8 = 1 << 0;
const CONFIG_BASE: u8 = CONFIG_EN_CRC | CONFIG_CRCO;

const STATUS_IRQ_MASK: u8 = 0x70;
const FIFO_RX_EMPTY: u8 = 0x01;
const SETUP_AW_5_BYTES: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    Spi,
    Pin,
    NotResponding,
}

pub struct Nrf24<SPI, CE, IRQ> {
    spi: SPI,
    ce: CE,
    irq: IRQ,
    config: u8,
}

impl<SPI, CE, IRQ> Nrf24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
    CE: OutputPin,
    IRQ: InputPin,
{
    pub fn new(spi: SPI, ce: CE, irq: IRQ) -> Self {
        Self {
            spi,
            ce,
            irq,
            config: CONFIG_BASE,
        }
    }

    fn command(&mut self, cmd: u8) -> Result<u8, RadioError> {
        let mut buf = [cmd];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(|_| RadioError::Spi)?;
        Ok(buf[0])
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, RadioError> {
        let mut buf = [R_REGISTER | reg, NOP];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(|_| RadioError::Spi)?;
        Ok(buf[1])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), RadioError> {
        self.spi
            .write(&[W_REGISTER | reg, value])
            .map_err(|_| RadioError::Spi)
    }

    fn write_reg_buf(&mut self, reg: u8, data: &[u8]) -> Result<(), RadioError> {
        self.spi
            .transaction(&mut [Operation::Write(&[W_REGISTER | reg]), Operation::Write(data)])
            .map_err(|_| RadioError::Spi)
    }

    fn write_config(&mut self, config: u8) -> Result<(), RadioError> {
        self.config = config;
        self.write_reg(REG_CONFIG, config)
    }
}

impl<SPI, CE, IRQ> Radio for Nrf24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
    CE: OutputPin,
    IRQ: InputPin,
{
    type Error = RadioError;

    fn init(&mut self, radio: &RadioConfig) -> Result<(), RadioError> {
        self.ce.set_low().map_err(|_| RadioError::Pin)?;

        self.write_config(CONFIG_BASE)?;
        // no chip → MISO floats and the readback won't match
        if self.read_reg(REG_CONFIG)? != CONFIG_BASE {
            return Err(RadioError::NotResponding);
        }

        self.write_reg(REG_EN_AA, 0x00)?;
        self.write_reg(REG_EN_RXADDR, 0x01)?;
        self.write_reg(REG_SETUP_AW, SETUP_AW_5_BYTES)?;
        self.write_reg(REG_SETUP_RETR, 0x00)?;
        self.write_reg(REG_RF_CH, radio.channel & 0x7F)?;
        self.set_power(radio.tx_power.power_level())?;
        self.write_reg_buf(REG_RX_ADDR_P0, &radio.mac)?;
        self.write_reg_buf(REG_TX_ADDR, &radio.mac)?;
        self.write_reg(REG_RX_PW_P0, BEACON_SIZE as u8)?;

        self.command(FLUSH_TX)?;
        self.command(FLUSH_RX)?;
        self.clear_interrupts()
    }

    fn set_power(&mut self, level: u8) -> Result<(), RadioError> {
        // 1 Mbit/s, RF_PWR in bits 2:1
        self.write_reg(REG_RF_SETUP, (level & 0x03) << 1)
    }

    fn set_receive_mode(&mut self, on: bool) -> Result<(), RadioError> {
        let mut config = CONFIG_BASE | CONFIG_PWR_UP;
        if on {
            config |= CONFIG_PRIM_RX;
        }
        self.write_config(config)
    }

    fn transmit(&mut self, frame: &[u8; BEACON_SIZE]) -> Result<(), RadioError> {
        self.command(FLUSH_TX)?;
        self.spi
            .transaction(&mut [Operation::Write(&[W_TX_PAYLOAD]), Operation::Write(frame)])
            .map_err(|_| RadioError::Spi)
    }

    fn chip_enable(&mut self, on: bool) -> Result<(), RadioError> {
        let result = if on { self.ce.set_high() } else { self.ce.set_low() };
        result.map_err(|_| RadioError::Pin)
    }

    fn irq_pending(&mut self) -> bool {
        // active low
        self.irq.is_low().unwrap_or(false)
    }

    fn read_frame(&mut self) -> Result<[u8; BEACON_SIZE], RadioError> {
        let mut frame = [0u8; BEACON_SIZE];
        self.spi
            .transaction(&mut [Operation::Write(&[R_RX_PAYLOAD]), Operation::Read(&mut frame)])
            .map_err(|_| RadioError::Spi)?;
        Ok(frame)
    }

    fn fifo_empty(&mut self) -> Result<bool, RadioError> {
        Ok(self.read_reg(REG_FIFO_STATUS)? & FIFO_RX_EMPTY != 0)
    }

    fn clear_interrupts(&mut self) -> Result<(), RadioError> {
        self.write_reg(REG_STATUS, STATUS_IRQ_MASK)
    }

    fn power_down(&mut self) -> Result<(), RadioError> {
        self.ce.set_low().map_err(|_| RadioError::Pin)?;
        self.write_config(CONFIG_BASE)
    }
}

impl<SPI, CE, IRQ> Nrf24<SPI, CE, IRQ> {
    /// Last CONFIG value written; handy when checking power state.
    pub fn config_register(&self) -> u8 {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TxStrength;
    use core::convert::Infallible;
    use embedded_hal::digital;
    use embedded_hal::spi::{self, ErrorKind};

    /// Register-file model of the chip, enough for the driver paths.
    struct FakeChip {
        regs: [u8; 0x20],
        tx_payload: Vec<u8>,
        rx_fifo: Vec<[u8; BEACON_SIZE]>,
        present: bool,
    }

    impl FakeChip {
        fn new() -> Self {
            Self {
                regs: [0; 0x20],
                tx_payload: Vec::new(),
                rx_fifo: Vec::new(),
                present: true,
            }
        }
    }

    impl spi::ErrorType for FakeChip {
        type Error = ErrorKind;
    }

    impl SpiDevice for FakeChip {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
            let mut cmd = None;
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => match cmd {
                        None => {
                            cmd = Some(bytes[0]);
                            if bytes.len() > 1 {
                                self.apply(bytes[0], &bytes[1..]);
                            }
                        }
                        Some(c) => self.apply(c, bytes),
                    },
                    Operation::Read(buf) => {
                        if cmd == Some(R_RX_PAYLOAD) && !self.rx_fifo.is_empty() {
                            buf.copy_from_slice(&self.rx_fifo.remove(0));
                        }
                    }
                    Operation::TransferInPlace(buf) => {
                        let c = buf[0];
                        if c & 0xE0 == R_REGISTER && buf.len() > 1 {
                            let reg = (c & 0x1F) as usize;
                            buf[1] = if !self.present {
                                0xFF
                            } else if reg == REG_FIFO_STATUS as usize {
                                if self.rx_fifo.is_empty() { FIFO_RX_EMPTY } else { 0 }
                            } else {
                                self.regs[reg]
                            };
                        }
                        buf[0] = 0x0E;
                    }
                    _ => unreachable!(),
                }
            }
            Ok(())
        }
    }

    impl FakeChip {
        fn apply(&mut self, cmd: u8, data: &[u8]) {
            if cmd == W_TX_PAYLOAD {
                self.tx_payload = data.to_vec();
            } else if cmd & 0xE0 == W_REGISTER {
                self.regs[(cmd & 0x1F) as usize] = data[0];
            }
        }
    }

    #[derive(Default)]
    struct Pin {
        high: bool,
    }

    impl digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    impl InputPin for Pin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
    }

    fn radio() -> Nrf24<FakeChip, Pin, Pin> {
        Nrf24::new(FakeChip::new(), Pin::default(), Pin { high: true })
    }

    #[test]
    fn init_programs_broadcast_setup() {
        let mut radio = radio();
        let config = RadioConfig::default();
        radio.init(&config).unwrap();

        let regs = &radio.spi.regs;
        assert_eq!(regs[REG_EN_AA as usize], 0);
        assert_eq!(regs[REG_RF_CH as usize], config.channel);
        assert_eq!(regs[REG_RX_PW_P0 as usize], BEACON_SIZE as u8);
        assert_eq!(regs[REG_RF_SETUP as usize], TxStrength::High.power_level() << 1);
        assert_eq!(regs[REG_STATUS as usize], STATUS_IRQ_MASK);
    }

    #[test]
    fn init_fails_without_chip() {
        let mut radio = radio();
        radio.spi.present = false;
        assert_eq!(radio.init(&RadioConfig::default()), Err(RadioError::NotResponding));
    }

    #[test]
    fn receive_mode_and_power_down() {
        let mut radio = radio();
        radio.set_receive_mode(true).unwrap();
        assert_eq!(radio.config_register(), CONFIG_BASE | CONFIG_PWR_UP | CONFIG_PRIM_RX);
        radio.set_receive_mode(false).unwrap();
        assert_eq!(radio.config_register(), CONFIG_BASE | CONFIG_PWR_UP);

        radio.chip_enable(true).unwrap();
        radio.power_down().unwrap();
        assert_eq!(radio.config_register(), CONFIG_BASE);
        assert!(!radio.ce.high);
    }

    #[test]
    fn transmit_uploads_payload() {
        let mut radio = radio();
        let frame = [0xA5u8; BEACON_SIZE];
        radio.transmit(&frame).unwrap();
        assert_eq!(radio.spi.tx_payload, frame.to_vec());
    }

    #[test]
    fn drains_rx_fifo() {
        let mut radio = radio();
        radio.spi.rx_fifo.push([1; BEACON_SIZE]);
        radio.spi.rx_fifo.push([2; BEACON_SIZE]);
        radio.irq.high = false;

        assert!(radio.irq_pending());
        assert!(!radio.fifo_empty().unwrap());
        assert_eq!(radio.read_frame().unwrap(), [1; BEACON_SIZE]);
        assert_eq!(radio.read_frame().unwrap(), [2; BEACON_SIZE]);
        assert!(radio.fifo_empty().unwrap());
    }
}
