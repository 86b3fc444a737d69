//! Transport abstraction for programmer communication
//!
//! The session only needs bulk transfers on a single endpoint pair plus a
//! few lifecycle calls. Implementations exist for real hardware
//! (`usbeeprom-nusb`) and for an in-memory emulator (`usbeeprom-dummy`).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TransportError;
use crate::protocol::{ENDPOINT_IN, ENDPOINT_OUT};

/// Bulk endpoint direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Device to host
    In,
    /// Host to device
    Out,
}

impl Endpoint {
    /// USB endpoint address
    pub const fn address(self) -> u8 {
        match self {
            Endpoint::In => ENDPOINT_IN,
            Endpoint::Out => ENDPOINT_OUT,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::In => write!(f, "IN 0x{:02x}", self.address()),
            Endpoint::Out => write!(f, "OUT 0x{:02x}", self.address()),
        }
    }
}

/// Stable identity of an attached programmer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    /// USB bus number
    pub bus: u8,
    /// USB device address
    pub address: u8,
}

impl DeviceId {
    /// Create an identifier from a bus/address pair
    pub const fn new(bus: u8, address: u8) -> Self {
        Self { bus, address }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bus, self.address)
    }
}

impl FromStr for DeviceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bus, address) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid device id '{}': expected bus:address", s))?;
        let bus = bus
            .trim()
            .parse()
            .map_err(|e| format!("invalid bus number '{}': {}", bus, e))?;
        let address = address
            .trim()
            .parse()
            .map_err(|e| format!("invalid device address '{}': {}", address, e))?;
        Ok(Self { bus, address })
    }
}

/// Transport trait for an opened programmer
///
/// All calls block until completion. A transfer may move fewer bytes than
/// requested; the caller is responsible for looping.
pub trait Transport {
    /// Bus/address identity of the underlying device
    fn id(&self) -> DeviceId;

    /// Maximum packet size of the given bulk endpoint
    fn max_packet_size(&self, endpoint: Endpoint) -> usize;

    /// Send `data` on the bulk OUT endpoint, returning bytes sent
    fn bulk_out(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Receive into `buf` from the bulk IN endpoint, returning bytes received
    fn bulk_in(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Issue a USB port reset.
    ///
    /// On success the transport must be usable again, re-opening the
    /// device if the reset invalidated the handle. On failure later
    /// transfers may keep failing until the transport is closed.
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Release the claimed interface
    fn release_interface(&mut self) -> Result<(), TransportError>;

    /// Close the device handle
    fn close(self)
    where
        Self: Sized;
}
