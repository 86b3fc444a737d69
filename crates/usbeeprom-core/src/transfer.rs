//! Chunked bulk transfers and status verification
//!
//! A payload is moved as a sequence of bulk transfers, each at most one
//! chunk long. The chunk defaults to the endpoint's maximum packet size;
//! page writes override it with the configured page size. Every transfer is
//! bounded by [`TRANSFER_TIMEOUT`] and the first failure aborts the whole
//! payload, so a failed transfer may leave the buffer partially filled.

use crate::error::{Error, Result};
use crate::protocol::{STATUS_LEN, TRANSFER_TIMEOUT};
use crate::transport::{Endpoint, Transport};

/// Caller-owned buffer together with its transfer direction
#[derive(Debug)]
pub enum Payload<'a> {
    /// Fill the buffer from the IN endpoint
    In(&'a mut [u8]),
    /// Send the buffer on the OUT endpoint
    Out(&'a [u8]),
}

impl Payload<'_> {
    /// Endpoint this payload moves over
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Payload::In(_) => Endpoint::In,
            Payload::Out(_) => Endpoint::Out,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            Payload::In(buf) => buf.len(),
            Payload::Out(data) => data.len(),
        }
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve the chunk size for an endpoint.
///
/// A requested size of 0 selects the endpoint's maximum packet size;
/// anything larger than that is rejected.
pub fn chunk_size(max_packet_size: usize, requested: usize) -> Result<usize> {
    match requested {
        0 => Ok(max_packet_size),
        n if n > max_packet_size => Err(Error::InvalidChunkSize {
            requested: n,
            max: max_packet_size,
        }),
        n => Ok(n),
    }
}

/// Move the entire payload in chunks of at most `chunk` bytes.
///
/// See [`chunk_size`] for how `chunk` is interpreted.
pub fn transfer<T: Transport + ?Sized>(
    transport: &mut T,
    payload: Payload<'_>,
    chunk: usize,
) -> Result<()> {
    let endpoint = payload.endpoint();
    let chunk = chunk_size(transport.max_packet_size(endpoint), chunk)?;
    let len = payload.len();

    let mut payload = payload;
    let mut offset = 0;
    while offset < len {
        let n = chunk.min(len - offset);
        let transferred = match &mut payload {
            Payload::In(buf) => transport.bulk_in(&mut buf[offset..offset + n], TRANSFER_TIMEOUT)?,
            Payload::Out(data) => transport.bulk_out(&data[offset..offset + n], TRANSFER_TIMEOUT)?,
        };
        log::trace!(
            "{} chunk at offset {}: {}/{} bytes",
            endpoint,
            offset,
            transferred,
            n
        );
        if transferred == 0 {
            return Err(Error::NoProgress { endpoint });
        }
        offset += transferred.min(n);
    }

    Ok(())
}

/// Read the status word and compare it against `expected`.
pub fn verify_status<T: Transport + ?Sized>(transport: &mut T, expected: u16) -> Result<()> {
    let mut status = [0xFF; STATUS_LEN];
    transfer(transport, Payload::In(&mut status), 0)?;

    let actual = u16::from_le_bytes(status);
    if actual != expected {
        return Err(Error::StatusMismatch { expected, actual });
    }

    log::trace!("status 0x{:04x} ok", actual);
    Ok(())
}
