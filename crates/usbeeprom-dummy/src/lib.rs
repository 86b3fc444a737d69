//! usbeeprom-dummy - In-memory programmer emulator for testing
//!
//! This crate provides a [`Transport`] that plays the firmware side of the
//! programmer protocol against a 64 KiB memory image. It's useful for
//! testing and development without real hardware, and can inject faults
//! (wrong status words, failed transfers) to exercise error paths.

use std::collections::VecDeque;
use std::time::Duration;

use usbeeprom_core::protocol::{HEADER_LEN, MAX_BYTES};
use usbeeprom_core::{DeviceId, Endpoint, Opcode, Transport, TransportError, TransportErrorKind};

/// Value every byte holds after a chip erase
pub const ERASED_VALUE: u8 = 0xFF;

/// Configuration for the dummy programmer
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Identity reported by the transport
    pub id: DeviceId,
    /// Maximum packet size of both bulk endpoints
    pub max_packet_size: usize,
    /// Added (wrapping) to every status word the programmer reports
    pub status_offset: u16,
    /// Index of the bulk transfer that fails with a timeout
    pub fail_transfer: Option<usize>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            id: DeviceId::new(0, 1),
            max_packet_size: 64, // full speed bulk
            status_offset: 0,
            fail_transfer: None,
        }
    }
}

/// One bulk transfer as requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRecord {
    /// Endpoint the transfer was issued on
    pub endpoint: Endpoint,
    /// Requested length in bytes
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for a command header
    Idle,
    /// Accepting write payload
    Writing {
        opcode: Opcode,
        addr: usize,
        remaining: usize,
    },
}

/// Dummy programmer
///
/// Emulates the programmer firmware in memory for testing purposes.
pub struct DummyProgrammer {
    config: DummyConfig,
    memory: Vec<u8>,
    state: State,
    /// Bytes waiting to be read from the IN endpoint
    pending_in: VecDeque<u8>,
    transfers: Vec<TransferRecord>,
    resets: usize,
    released: bool,
}

impl DummyProgrammer {
    /// Create a new dummy programmer with an erased chip
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config,
            memory: vec![ERASED_VALUE; MAX_BYTES],
            state: State::Idle,
            pending_in: VecDeque::new(),
            transfers: Vec::new(),
            resets: 0,
            released: false,
        }
    }

    /// Create a new dummy programmer with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy programmer with pre-filled memory
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut programmer = Self::new(config);
        let len = initial_data.len().min(MAX_BYTES);
        programmer.memory[..len].copy_from_slice(&initial_data[..len]);
        programmer
    }

    /// Get a reference to the emulated chip contents
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Get a mutable reference to the emulated chip contents
    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Get a mutable reference to the configuration
    pub fn config_mut(&mut self) -> &mut DummyConfig {
        &mut self.config
    }

    /// All bulk transfers issued so far
    pub fn transfers(&self) -> &[TransferRecord] {
        &self.transfers
    }

    /// Forget recorded transfers
    pub fn clear_transfers(&mut self) {
        self.transfers.clear();
    }

    /// Number of resets issued
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Whether the interface has been released
    pub fn is_released(&self) -> bool {
        self.released
    }

    fn record(&mut self, endpoint: Endpoint, len: usize) -> Result<(), TransportError> {
        let index = self.transfers.len();
        self.transfers.push(TransferRecord { endpoint, len });

        if self.released {
            return Err(TransportError::new(
                TransportErrorKind::NotFound,
                "interface has been released",
            ));
        }
        if self.config.fail_transfer == Some(index) {
            log::debug!("dummy: failing transfer {}", index);
            return Err(TransportError::timeout());
        }
        Ok(())
    }

    fn queue_status(&mut self, status: u16) {
        let status = status.wrapping_add(self.config.status_offset);
        self.pending_in.extend(status.to_le_bytes());
    }

    fn handle_header(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let opcode = Opcode::from_byte(data[0]).ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::Stall,
                format!("unknown opcode 0x{:02x}", data[0]),
            )
        })?;

        if opcode == Opcode::Erase {
            self.memory.fill(ERASED_VALUE);
            self.queue_status(0);
            log::debug!("dummy: chip erased");
            return Ok(1);
        }

        if data.len() < HEADER_LEN {
            return Err(TransportError::new(
                TransportErrorKind::Stall,
                format!("short header ({} bytes)", data.len()),
            ));
        }

        let start = u16::from_le_bytes([data[1], data[2]]) as usize;
        let count = u16::from_le_bytes([data[3], data[4]]) as usize + 1;
        if start + count > MAX_BYTES {
            return Err(TransportError::new(
                TransportErrorKind::Stall,
                format!("range 0x{:04x}+{} out of bounds", start, count),
            ));
        }
        log::trace!("dummy: {} at 0x{:04x}, {} bytes", opcode, start, count);

        if opcode == Opcode::Read {
            self.pending_in
                .extend(self.memory[start..start + count].iter().copied());
            self.queue_status(((start + count) % MAX_BYTES) as u16);
        } else {
            self.state = State::Writing {
                opcode,
                addr: start,
                remaining: count,
            };
        }

        Ok(HEADER_LEN)
    }

    fn handle_payload(
        &mut self,
        data: &[u8],
        opcode: Opcode,
        addr: usize,
        remaining: usize,
    ) -> usize {
        let n = data.len().min(remaining);
        self.memory[addr..addr + n].copy_from_slice(&data[..n]);
        log::trace!("dummy: {} {} bytes at 0x{:04x}", opcode, n, addr);

        let addr = addr + n;
        let remaining = remaining - n;
        if remaining == 0 {
            self.state = State::Idle;
            self.queue_status((addr % MAX_BYTES) as u16);
        } else {
            self.state = State::Writing {
                opcode,
                addr,
                remaining,
            };
        }
        n
    }
}

impl Transport for DummyProgrammer {
    fn id(&self) -> DeviceId {
        self.config.id
    }

    fn max_packet_size(&self, _endpoint: Endpoint) -> usize {
        self.config.max_packet_size
    }

    fn bulk_out(&mut self, data: &[u8], _timeout: Duration) -> Result<usize, TransportError> {
        self.record(Endpoint::Out, data.len())?;
        if data.is_empty() {
            return Ok(0);
        }

        match self.state {
            State::Idle => self.handle_header(data),
            State::Writing {
                opcode,
                addr,
                remaining,
            } => Ok(self.handle_payload(data, opcode, addr, remaining)),
        }
    }

    fn bulk_in(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        self.record(Endpoint::In, buf.len())?;

        let n = buf.len().min(self.pending_in.len());
        if n == 0 {
            // Nothing queued: real hardware would just let the transfer expire
            return Err(TransportError::timeout());
        }
        for (dst, src) in buf.iter_mut().zip(self.pending_in.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.resets += 1;
        self.state = State::Idle;
        self.pending_in.clear();
        Ok(())
    }

    fn release_interface(&mut self) -> Result<(), TransportError> {
        if self.released {
            return Err(TransportError::new(
                TransportErrorKind::NotFound,
                "interface already released",
            ));
        }
        self.released = true;
        Ok(())
    }

    fn close(self) {
        log::debug!("dummy: closed {}", self.config.id);
    }
}
