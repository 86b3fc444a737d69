//! Device session
//!
//! [`Eeprom`] wraps an opened transport and implements the four data
//! operations on top of it. Each operation follows the same sequence:
//!
//! 1. validate the address range (no I/O on failure)
//! 2. send the command header on the OUT endpoint
//! 3. move the payload, if any
//! 4. read back and check the status word
//!
//! After any failed operation the documented recovery is [`Eeprom::reset`]
//! before trying again.

use crate::error::{Error, Result};
use crate::protocol::{Command, RESET_SETTLE_TIME};
use crate::transfer::{chunk_size, transfer, verify_status, Payload};
use crate::transport::{DeviceId, Endpoint, Transport};

/// An opened USB EEPROM programmer
///
/// The session is strictly blocking and must not be shared between threads
/// without external serialisation. Closing consumes the session.
pub struct Eeprom<T: Transport> {
    transport: T,
    /// Chunk size for page writes, 0 selects the OUT packet size
    page_size: usize,
}

impl<T: Transport> Eeprom<T> {
    /// Wrap a transport whose interface has already been claimed
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            page_size: 0,
        }
    }

    /// Identifier of the underlying device (`bus:address`)
    pub fn id(&self) -> DeviceId {
        self.transport.id()
    }

    /// Set the number of bytes written per page by [`Eeprom::write_pages`].
    ///
    /// By default the maximum packet size of the OUT endpoint is used;
    /// passing 0 restores that default. The value is checked against the
    /// endpoint when the next page write starts.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size;
    }

    /// Page size currently in effect for page writes
    pub fn page_size(&self) -> usize {
        match self.page_size {
            0 => self.transport.max_packet_size(Endpoint::Out),
            n => n,
        }
    }

    /// Read `buf.len()` bytes starting at `start`
    pub fn read(&mut self, start: u16, buf: &mut [u8]) -> Result<()> {
        self.execute(Command::Read { start, buf })
    }

    /// Write `data` starting at `start`, one byte at a time
    pub fn write_bytes(&mut self, start: u16, data: &[u8]) -> Result<()> {
        self.execute(Command::WriteBytes { start, data })
    }

    /// Write `data` starting at `start` using page writes
    pub fn write_pages(&mut self, start: u16, data: &[u8]) -> Result<()> {
        self.execute(Command::WritePages { start, data })
    }

    /// Erase the whole chip
    pub fn erase(&mut self) -> Result<()> {
        self.execute(Command::Erase)
    }

    /// Run a single command through the header/payload/status sequence
    pub fn execute(&mut self, cmd: Command<'_>) -> Result<()> {
        cmd.validate()?;

        // Resolve the page size up front so a bad value never leaves the
        // firmware waiting for a payload after the header
        let payload_chunk = if matches!(cmd, Command::WritePages { .. }) {
            chunk_size(
                self.transport.max_packet_size(Endpoint::Out),
                self.page_size,
            )?
        } else {
            0
        };

        let frame = cmd.frame();
        let expected = cmd.expected_status();
        match cmd.range() {
            Some((start, len)) => log::debug!(
                "{}: {} at 0x{:04X}, {} bytes",
                self.id(),
                cmd.opcode(),
                start,
                len
            ),
            None => log::debug!("{}: {}", self.id(), cmd.opcode()),
        }

        transfer(&mut self.transport, Payload::Out(frame.as_bytes()), 0)?;

        match cmd {
            Command::Read { buf, .. } => transfer(&mut self.transport, Payload::In(buf), 0)?,
            Command::WriteBytes { data, .. } => {
                transfer(&mut self.transport, Payload::Out(data), 0)?
            }
            Command::WritePages { data, .. } => {
                transfer(&mut self.transport, Payload::Out(data), payload_chunk)?
            }
            Command::Erase => {}
        }

        verify_status(&mut self.transport, expected)
    }

    /// Hard reset the programmer.
    ///
    /// Always waits for the firmware to settle, whether or not the reset
    /// succeeded. The result may be ignored when used for recovery.
    ///
    /// After a successful reset the session can be used again: the nusb
    /// transport re-opens the programmer once it re-enumerates and the
    /// dummy programmer just drops its half-finished command. If the reset
    /// failed, open a new session instead of retrying on this one.
    pub fn reset(&mut self) -> Result<()> {
        log::info!("Resetting {}", self.id());
        let result = self.transport.reset();
        std::thread::sleep(RESET_SETTLE_TIME);
        result.map_err(Error::from)
    }

    /// Release the interface and close the device.
    ///
    /// The handle is closed even if releasing the interface fails; that
    /// error is returned and may be ignored.
    pub fn close(self) -> Result<()> {
        let id = self.id();
        let mut transport = self.transport;

        let result = transport.release_interface();
        transport.close();

        log::debug!("Closed {}", id);
        result.map_err(Error::from)
    }

    /// Borrow the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> std::fmt::Debug for Eeprom<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Eeprom")
            .field("id", &self.id())
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MAX_BYTES;
    use crate::testing::ScriptedTransport;
    use std::time::Instant;

    fn session(max_packet_size: usize) -> Eeprom<ScriptedTransport> {
        Eeprom::new(ScriptedTransport::new(max_packet_size))
    }

    #[test]
    fn test_read_sequence() {
        let mut dev = session(64);
        dev.transport_mut().queue_in(&[1, 2, 3, 4]);
        dev.transport_mut().queue_status(0x0104);

        let mut buf = [0u8; 4];
        dev.read(0x0100, &mut buf).unwrap();

        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(dev.transport().sent(), &[b'R', 0x00, 0x01, 0x03, 0x00]);
        assert_eq!(
            dev.transport().transfers(),
            &[(Endpoint::Out, 5), (Endpoint::In, 4), (Endpoint::In, 2)]
        );
    }

    #[test]
    fn test_write_bytes_uses_packet_size() {
        let mut dev = session(64);
        dev.set_page_size(16);
        dev.transport_mut().queue_status(130);

        let data = [0x55u8; 130];
        dev.write_bytes(0, &data).unwrap();

        // Page size only applies to page writes
        assert_eq!(dev.transport().out_lengths(), vec![5, 64, 64, 2]);
        assert_eq!(&dev.transport().sent()[5..], &data[..]);
    }

    #[test]
    fn test_write_pages_uses_page_size() {
        let mut dev = session(64);
        dev.set_page_size(64);
        dev.transport_mut().queue_status(256);

        dev.write_pages(0, &[0u8; 256]).unwrap();

        assert_eq!(dev.transport().out_lengths(), vec![5, 64, 64, 64, 64]);
        assert_eq!(dev.transport().sent()[0], b'P');
    }

    #[test]
    fn test_page_size_zero_restores_default() {
        let mut dev = session(32);
        dev.set_page_size(8);
        assert_eq!(dev.page_size(), 8);
        dev.set_page_size(0);
        assert_eq!(dev.page_size(), 32);

        dev.transport_mut().queue_status(64);
        dev.write_pages(0, &[0u8; 64]).unwrap();
        assert_eq!(dev.transport().out_lengths(), vec![5, 32, 32]);
    }

    #[test]
    fn test_oversized_page_rejected_before_header() {
        let mut dev = session(64);
        dev.set_page_size(128);

        let err = dev.write_pages(0, &[0u8; 256]).unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidChunkSize {
                requested: 128,
                max: 64
            }
        ));
        assert!(dev.transport().transfers().is_empty());
    }

    #[test]
    fn test_validation_performs_no_io() {
        let mut dev = session(64);

        let mut empty: [u8; 0] = [];
        assert!(matches!(dev.read(0, &mut empty), Err(Error::EmptyBuffer)));
        assert!(matches!(
            dev.write_bytes(0xFFFF, &[0, 0]),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            dev.write_pages(1, &vec![0u8; MAX_BYTES]),
            Err(Error::OutOfRange { .. })
        ));

        assert!(dev.transport().transfers().is_empty());
    }

    #[test]
    fn test_status_off_by_one_is_reported() {
        let mut dev = session(64);
        dev.transport_mut().queue_status(0x10 + 8 - 1);

        let err = dev.write_bytes(0x10, &[0u8; 8]).unwrap_err();

        match err {
            Error::StatusMismatch { expected, actual } => {
                assert_eq!(expected, 0x18);
                assert_eq!(actual, 0x17);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_erase_sends_opcode_and_expects_zero() {
        let mut dev = session(64);
        dev.transport_mut().queue_status(0);
        dev.erase().unwrap();
        assert_eq!(dev.transport().sent(), b"Z");

        dev.transport_mut().queue_status(1);
        assert!(matches!(
            dev.erase(),
            Err(Error::StatusMismatch {
                expected: 0,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_failed_payload_skips_status() {
        let mut dev = session(64);
        // header is transfer 0, first payload chunk is transfer 1
        dev.transport_mut().fail_transfer(1);

        let err = dev.write_bytes(0, &[0u8; 100]).unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(dev.transport().transfers().len(), 2);
    }

    #[test]
    fn test_close_releases_then_closes() {
        let dev = session(64);
        let calls = dev.transport().calls();
        dev.close().unwrap();
        assert_eq!(*calls.borrow(), vec!["release", "close"]);
    }

    #[test]
    fn test_close_still_closes_after_release_failure() {
        let mut dev = session(64);
        dev.transport_mut().fail_release();
        let calls = dev.transport().calls();

        assert!(matches!(dev.close(), Err(Error::Transport(_))));
        assert_eq!(*calls.borrow(), vec!["release", "close"]);
    }

    #[test]
    fn test_reset_waits_even_on_failure() {
        let mut dev = session(64);
        dev.transport_mut().fail_reset();

        let started = Instant::now();
        assert!(dev.reset().is_err());
        assert!(started.elapsed() >= RESET_SETTLE_TIME);
        assert_eq!(*dev.transport().calls().borrow(), vec!["reset"]);
    }

    #[test]
    fn test_id_is_bus_and_address() {
        let dev = session(64);
        assert_eq!(dev.id().to_string(), "1:4");
    }
}
