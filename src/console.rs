// Diagnostic console
//
// Line-based, single-character commands over any `embedded_io::Write` sink.
// Used when the tag boots attached to a host instead of running the beacon
// loop.

use core::fmt;

use embedded_io::{Write, WriteFmtError};

use crate::beacon::DeviceIdentity;
use crate::config::{RadioConfig, LOG_STORAGE_SIZE};
use crate::drivers::{CursorStore, Storage};
use crate::logfile::{LogError, LogWriter};

const LINE_BUFFER_SIZE: usize = 64;
/// Longest line kept; anything after is dropped until the terminator.
pub const LINE_MAX: usize = LINE_BUFFER_SIZE - 2;

const TEST_PATTERN: &[u8] = b"Hello World!\0";
const READ_TEST_LEN: usize = 32;
const FILL_CHUNK_WORDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Erase,
    WriteTest,
    ReadTest,
    FillTest,
    Unknown(u8),
}

impl Command {
    /// `None` for control characters and space.
    pub fn parse(key: u8) -> Option<Self> {
        if key <= b' ' {
            return None;
        }
        Some(match key.to_ascii_uppercase() {
            b'H' | b'?' => Self::Help,
            b'S' => Self::Status,
            b'E' => Self::Erase,
            b'W' => Self::WriteTest,
            b'R' => Self::ReadTest,
            b'F' => Self::FillTest,
            _ => Self::Unknown(key),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Key(u8),
    TooLong { text: [u8; LINE_MAX], len: usize },
}

impl Line {
    fn text(&self) -> &[u8] {
        match self {
            Self::Key(k) => core::slice::from_ref(k),
            Self::TooLong { text, len } => &text[..*len],
        }
    }
}

/// Collects bytes until a control character ends a non-empty line.
#[derive(Debug)]
pub struct LineBuffer {
    text: [u8; LINE_MAX],
    len: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            text: [0; LINE_MAX],
            len: 0,
        }
    }

    pub fn push(&mut self, byte: u8) -> Option<Line> {
        if byte < b' ' {
            if self.len == 0 {
                return None;
            }
            let line = if self.len == 1 {
                Line::Key(self.text[0])
            } else {
                Line::TooLong {
                    text: self.text,
                    len: self.len,
                }
            };
            self.len = 0;
            return Some(line);
        }
        if self.len < LINE_MAX {
            self.text[self.len] = byte;
            self.len += 1;
        }
        None
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleError<E> {
    Io(E),
    Format,
}

impl<E> From<WriteFmtError<E>> for ConsoleError<E> {
    fn from(e: WriteFmtError<E>) -> Self {
        match e {
            WriteFmtError::Other(e) => Self::Io(e),
            _ => Self::Format,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for ConsoleError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "console io error: {e:?}"),
            Self::Format => f.write_str("console format error"),
        }
    }
}

pub struct Console<S, C> {
    identity: DeviceIdentity,
    mac: [u8; 5],
    log: LogWriter<S, C>,
    line: LineBuffer,
}

impl<S: Storage, C: CursorStore> Console<S, C> {
    pub fn new(identity: DeviceIdentity, radio: &RadioConfig, log: LogWriter<S, C>) -> Self {
        Self {
            identity,
            mac: radio.mac,
            log,
            line: LineBuffer::new(),
        }
    }

    pub fn log_mut(&mut self) -> &mut LogWriter<S, C> {
        &mut self.log
    }

    pub fn prompt<W: Write>(&mut self, out: &mut W) -> Result<(), ConsoleError<W::Error>> {
        write!(out, "\n# ")?;
        Ok(())
    }

    /// Feed received bytes; completed lines are executed as they appear.
    pub fn handle<W: Write>(
        &mut self,
        input: &[u8],
        out: &mut W,
    ) -> Result<(), ConsoleError<W::Error>> {
        for &byte in input {
            match self.line.push(byte) {
                Some(Line::Key(key)) => self.execute_key(key, out)?,
                Some(line) => {
                    out.write_all(b"Unknown command '").map_err(ConsoleError::Io)?;
                    out.write_all(line.text()).map_err(ConsoleError::Io)?;
                    out.write_all(b"' - please press H+[Enter] for help\n# ")
                        .map_err(ConsoleError::Io)?;
                }
                None => {}
            }
        }
        Ok(())
    }

    fn execute_key<W: Write>(&mut self, key: u8, out: &mut W) -> Result<(), ConsoleError<W::Error>> {
        let Some(command) = Command::parse(key) else {
            return Ok(());
        };
        out.write_all(&[key, b'\n']).map_err(ConsoleError::Io)?;
        self.execute(command, out)?;
        self.prompt(out)
    }

    pub fn execute<W: Write>(
        &mut self,
        command: Command,
        out: &mut W,
    ) -> Result<(), ConsoleError<W::Error>> {
        match command {
            Command::Help => self.help(out),
            Command::Status => self.status(out),
            Command::Erase => {
                write!(out, "\nErasing Storage...\n\n")?;
                let result = self.log.erase();
                report(out, result)
            }
            Command::WriteTest => {
                write!(
                    out,
                    "\n * writing 'Hello World!' ({} bytes)\n",
                    TEST_PATTERN.len()
                )?;
                let result = self.log.storage_mut().write(0, TEST_PATTERN);
                report(out, result.map_err(LogError::Storage))
            }
            Command::ReadTest => self.read_test(out),
            Command::FillTest => self.fill_test(out),
            Command::Unknown(key) => {
                write!(
                    out,
                    "Unknown command '{}' - please press 'H' for help \n",
                    key as char
                )?;
                Ok(())
            }
        }
    }

    fn help<W: Write>(&mut self, out: &mut W) -> Result<(), ConsoleError<W::Error>> {
        write!(
            out,
            "\n *****************************************************\n\
             \x20* Beacon Tag - Diagnostic Console\n\
             \x20*                  Version v{}\n\
             \x20*****************************************************\n\
             \x20* H,?          - this help screen\n\
             \x20* S            - Show device status\n\
             \x20*\n\
             \x20* E            - Erase Storage\n\
             \x20* W            - Test Write Storage\n\
             \x20* R            - Test Read Storage\n\
             \x20* F            - Test WriteFill Storage\n\
             \x20*****************************************************\n\n",
            env!("CARGO_PKG_VERSION")
        )?;
        Ok(())
    }

    fn status<W: Write>(&mut self, out: &mut W) -> Result<(), ConsoleError<W::Error>> {
        let uid = self.identity.uid();
        let m = self.mac;
        write!(
            out,
            "\n *****************************************************\n\
             \x20* Beacon Tag Status Information\n\
             \x20*****************************************************\n\
             \x20* Device UID: {:08X}:{:08X}:{:08X}:{:08X}\n\
             \x20* Beacon MAC: {:02X}:{:02X}:{:02X}:{:02X}:{:02X}\n\
             \x20*     Tag ID: {:04X}\n\
             \x20* Stored Logfile Items: {}\n",
            uid[0],
            uid[1],
            uid[2],
            uid[3],
            m[0],
            m[1],
            m[2],
            m[3],
            m[4],
            self.identity.tag_id(),
            self.log.len(),
        )?;
        match self.log.storage_mut().status() {
            Ok(status) => write!(out, " * Storage Status: 0x{:02X}\n", status)?,
            Err(_) => write!(out, " * Storage Status: unavailable\n")?,
        }
        write!(
            out,
            " * Storage Size: {} bytes\n\
             \x20*****************************************************\n\n",
            self.log.capacity()
        )?;
        Ok(())
    }

    fn read_test<W: Write>(&mut self, out: &mut W) -> Result<(), ConsoleError<W::Error>> {
        let mut buf = [0u8; READ_TEST_LEN];
        write!(out, "\n * reading {} bytes\n", buf.len())?;
        if self.log.storage_mut().read(0, &mut buf).is_err() {
            write!(out, " * read failed\n")?;
            return Ok(());
        }
        hex_dump(out, 0, &buf)
    }

    fn fill_test<W: Write>(&mut self, out: &mut W) -> Result<(), ConsoleError<W::Error>> {
        write!(out, "\nErasing Storage...\n\n")?;
        if self.log.erase().is_err() {
            write!(out, " * erase failed\n")?;
            return Ok(());
        }

        write!(out, "\nFilling Storage...\n")?;
        let size = self.log.capacity().min(LOG_STORAGE_SIZE);
        let words = size / 4;
        let mut chunk = [0u8; FILL_CHUNK_WORDS * 4];
        let mut counter = 0u32;
        while counter < words {
            let n = (words - counter).min(FILL_CHUNK_WORDS as u32) as usize;
            for (i, slot) in chunk.chunks_exact_mut(4).take(n).enumerate() {
                slot.copy_from_slice(&(counter + i as u32).to_le_bytes());
            }
            if self
                .log
                .storage_mut()
                .write(counter * 4, &chunk[..n * 4])
                .is_err()
            {
                write!(out, " * write failed at 0x{:08X}\n", counter * 4)?;
                return Ok(());
            }
            counter += n as u32;
        }
        write!(out, "\n[DONE]\n")?;
        Ok(())
    }
}

fn report<W: Write, E>(
    out: &mut W,
    result: Result<(), LogError<E>>,
) -> Result<(), ConsoleError<W::Error>> {
    match result {
        Ok(()) => write!(out, " * ok\n")?,
        Err(_) => write!(out, " * failed\n")?,
    }
    Ok(())
}

fn hex_dump<W: Write>(out: &mut W, base: u32, data: &[u8]) -> Result<(), ConsoleError<W::Error>> {
    for (row, bytes) in data.chunks(16).enumerate() {
        write!(out, "{:08X}:", base + (row * 16) as u32)?;
        for b in bytes {
            write!(out, " {:02X}", b)?;
        }
        write!(out, "  |")?;
        for &b in bytes {
            let c = if b.is_ascii_graphic() || b == b' ' { b } else { b'.' };
            out.write_all(&[c]).map_err(ConsoleError::Io)?;
        }
        write!(out, "|\n")?;
    }
    Ok(())
}
