//! usbeeprom-core - Protocol core for USB EEPROM programmers
//!
//! This crate implements the host side of the USB EEPROM programmer
//! protocol: command framing, chunked bulk transfers, status verification
//! and the [`Eeprom`] session that ties them together. It does not talk to
//! USB itself; anything implementing [`Transport`] can carry the protocol.
//!
//! The protocol is chip-agnostic. Capacity and alignment constraints of the
//! attached chip must be enforced by the caller; the only check performed
//! here is that every range fits in the 64 KiB address space
//! ([`MAX_BYTES`]).
//!
//! # Example
//!
//! ```no_run
//! use usbeeprom_core::{Eeprom, Transport, MAX_BYTES};
//!
//! fn dump<T: Transport>(dev: &mut Eeprom<T>) -> usbeeprom_core::Result<Vec<u8>> {
//!     let mut data = vec![0u8; MAX_BYTES];
//!     if let Err(e) = dev.read(0, &mut data) {
//!         let _ = dev.reset();
//!         return Err(e);
//!     }
//!     Ok(data)
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod device;
pub mod error;
pub mod protocol;
pub mod transfer;
pub mod transport;

#[cfg(test)]
mod testing;

pub use device::Eeprom;
pub use error::{Error, Result, TransportError, TransportErrorKind};
pub use protocol::{Command, Opcode, MAX_BYTES};
pub use transport::{DeviceId, Endpoint, Transport};
