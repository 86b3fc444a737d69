//! usbeeprom-nusb - USB transport for EEPROM programmers
//!
//! This crate binds the protocol core to real hardware through `nusb`.
//! Programmers are found by vendor/product ID (VID:04d8 PID:f4cd) and
//! talked to over bulk endpoint 1 of interface 0.
//!
//! # Example
//!
//! ```no_run
//! use usbeeprom_nusb::Context;
//!
//! let ctx = Context::new();
//!
//! // Visit every attached programmer; open inside the visitor
//! ctx.walk(|dev| {
//!     println!("found {}", dev.id());
//!     Ok(())
//! })?;
//!
//! // Or just take the first one
//! let mut eeprom = ctx.first()?;
//! let mut buf = [0u8; 16];
//! eeprom.read(0, &mut buf)?;
//! let _ = eeprom.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

mod context;
mod error;
mod transport;

pub use context::{Context, DeviceFilter, DeviceRef, USB_PRODUCT, USB_VENDOR};
pub use transport::NusbTransport;
