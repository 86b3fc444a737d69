//! Wire protocol constants and command framing
//!
//! Every operation starts with a header sent on the bulk OUT endpoint:
//!
//! ```text
//! [opcode:1][start:2 LE][count-1:2 LE]
//! ```
//!
//! The count is sent as `count - 1` so that a full 64 KiB transfer fits in
//! 16 bits. After the payload the programmer answers with a 2-byte little
//! endian status word holding the address following the last byte it
//! processed (or 0 after a chip erase).

use std::time::Duration;

use crate::error::{Error, Result};

/// Maximum amount of addressable data (64 KiB)
pub const MAX_BYTES: usize = 1 << 16;

/// USB interface claimed on the programmer
pub const INTERFACE: u8 = 0;
/// Bulk endpoint number shared by both directions
pub const ENDPOINT_NUM: u8 = 1;
/// Bulk IN endpoint address
pub const ENDPOINT_IN: u8 = ENDPOINT_NUM | 0x80;
/// Bulk OUT endpoint address
pub const ENDPOINT_OUT: u8 = ENDPOINT_NUM;

/// Timeout applied to every individual bulk transfer
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(2500);
/// Time the firmware needs to come back after a hard reset
pub const RESET_SETTLE_TIME: Duration = Duration::from_millis(500);

/// Length of a read/write command header
pub const HEADER_LEN: usize = 5;
/// Length of the status word returned after every command
pub const STATUS_LEN: usize = 2;

/// Command opcodes understood by the programmer firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Read bytes
    Read = b'R',
    /// Write bytes one at a time
    WriteBytes = b'W',
    /// Write using the chip's page write mode
    WritePages = b'P',
    /// Chip erase
    Erase = b'Z',
}

impl Opcode {
    /// Raw opcode byte
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Decode an opcode byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'R' => Some(Opcode::Read),
            b'W' => Some(Opcode::WriteBytes),
            b'P' => Some(Opcode::WritePages),
            b'Z' => Some(Opcode::Erase),
            _ => None,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Opcode::Read => "read",
            Opcode::WriteBytes => "write-bytes",
            Opcode::WritePages => "write-pages",
            Opcode::Erase => "erase",
        };
        write!(f, "{} ('{}')", name, self.as_byte() as char)
    }
}

/// Encode a read/write header.
///
/// `count` must be in `1..=MAX_BYTES`; callers validate before encoding.
pub fn encode_header(opcode: Opcode, start: u16, count: usize) -> [u8; HEADER_LEN] {
    let n = (count - 1) as u16;
    let mut header = [0u8; HEADER_LEN];
    header[0] = opcode.as_byte();
    header[1..3].copy_from_slice(&start.to_le_bytes());
    header[3..5].copy_from_slice(&n.to_le_bytes());
    header
}

/// Address reached after moving `count` bytes from `start`, modulo 2^16.
pub fn end_address(start: u16, count: usize) -> u16 {
    ((start as usize + count) % MAX_BYTES) as u16
}

/// Check that `[start, start + len)` is a non-empty range inside the
/// address space.
pub fn validate_range(start: u16, len: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::EmptyBuffer);
    }
    if start as usize + len > MAX_BYTES {
        return Err(Error::OutOfRange { start, len });
    }
    Ok(())
}

/// Header bytes for one command as they go on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; HEADER_LEN],
    len: usize,
}

impl Frame {
    /// The bytes to transmit
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// One protocol command together with the caller's buffer
#[derive(Debug)]
pub enum Command<'a> {
    /// Read `buf.len()` bytes starting at `start` into `buf`
    Read {
        /// First address
        start: u16,
        /// Destination buffer
        buf: &'a mut [u8],
    },
    /// Write `data` starting at `start`, byte by byte
    WriteBytes {
        /// First address
        start: u16,
        /// Source data
        data: &'a [u8],
    },
    /// Write `data` starting at `start` in page sized chunks
    WritePages {
        /// First address
        start: u16,
        /// Source data
        data: &'a [u8],
    },
    /// Erase the whole chip
    Erase,
}

impl Command<'_> {
    /// Opcode for this command
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Read { .. } => Opcode::Read,
            Command::WriteBytes { .. } => Opcode::WriteBytes,
            Command::WritePages { .. } => Opcode::WritePages,
            Command::Erase => Opcode::Erase,
        }
    }

    /// Start address and byte count, if the command carries a payload
    pub fn range(&self) -> Option<(u16, usize)> {
        match self {
            Command::Read { start, buf } => Some((*start, buf.len())),
            Command::WriteBytes { start, data } | Command::WritePages { start, data } => {
                Some((*start, data.len()))
            }
            Command::Erase => None,
        }
    }

    /// Validate the command's address range
    pub fn validate(&self) -> Result<()> {
        match self.range() {
            Some((start, len)) => validate_range(start, len),
            None => Ok(()),
        }
    }

    /// Build the header frame. The command must have been validated.
    pub fn frame(&self) -> Frame {
        match self.range() {
            Some((start, len)) => Frame {
                bytes: encode_header(self.opcode(), start, len),
                len: HEADER_LEN,
            },
            // The firmware starts a chip erase as soon as it sees the opcode
            None => {
                let mut bytes = [0u8; HEADER_LEN];
                bytes[0] = self.opcode().as_byte();
                Frame { bytes, len: 1 }
            }
        }
    }

    /// Status word the programmer reports once the command completes
    pub fn expected_status(&self) -> u16 {
        match self.range() {
            Some((start, len)) => end_address(start, len),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header_layout() {
        assert_eq!(
            encode_header(Opcode::Read, 0x1234, 0x100),
            [b'R', 0x34, 0x12, 0xFF, 0x00]
        );
        assert_eq!(
            encode_header(Opcode::WriteBytes, 0, 1),
            [b'W', 0x00, 0x00, 0x00, 0x00]
        );
        // A full 64 KiB transfer encodes as 0xFFFF
        assert_eq!(
            encode_header(Opcode::WritePages, 0, MAX_BYTES),
            [b'P', 0x00, 0x00, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_opcode_bytes() {
        assert_eq!(Opcode::Read.as_byte(), 0x52);
        assert_eq!(Opcode::WriteBytes.as_byte(), 0x57);
        assert_eq!(Opcode::WritePages.as_byte(), 0x50);
        assert_eq!(Opcode::Erase.as_byte(), 0x5A);
        assert_eq!(Opcode::from_byte(b'Z'), Some(Opcode::Erase));
        assert_eq!(Opcode::from_byte(b'X'), None);
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(0, 1).is_ok());
        assert!(validate_range(0, MAX_BYTES).is_ok());
        assert!(validate_range(0xFFFF, 1).is_ok());
        assert!(matches!(validate_range(0, 0), Err(Error::EmptyBuffer)));
        assert!(matches!(
            validate_range(0xFFFF, 2),
            Err(Error::OutOfRange { start: 0xFFFF, len: 2 })
        ));
        assert!(matches!(
            validate_range(1, MAX_BYTES),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_expected_status_wraps_at_top() {
        let data = [0u8; 16];
        let cmd = Command::WriteBytes {
            start: 0x100,
            data: &data,
        };
        assert_eq!(cmd.expected_status(), 0x110);

        let cmd = Command::WriteBytes {
            start: 0xFFF0,
            data: &data,
        };
        assert_eq!(cmd.expected_status(), 0);
        assert_eq!(Command::Erase.expected_status(), 0);
    }

    #[test]
    fn test_erase_frame_is_opcode_only() {
        assert_eq!(Command::Erase.frame().as_bytes(), b"Z");

        let mut buf = [0u8; 4];
        let cmd = Command::Read {
            start: 2,
            buf: &mut buf,
        };
        assert_eq!(cmd.frame().as_bytes(), &[b'R', 2, 0, 3, 0]);
    }
}
