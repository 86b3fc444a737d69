//! Conversions from nusb errors into transport errors

use nusb::transfer::TransferError;
use usbeeprom_core::{TransportError, TransportErrorKind};

/// Map a failed device/interface call, prefixing what was attempted
pub(crate) fn usb_error(what: &str, e: impl std::fmt::Display) -> TransportError {
    TransportError::new(TransportErrorKind::Other, format!("{}: {}", what, e))
}

/// Map a failed bulk transfer.
///
/// Blocking transfers are cancelled when their timeout expires, so a
/// cancellation is reported as a timeout.
pub(crate) fn transfer_error(e: TransferError) -> TransportError {
    let kind = match e {
        TransferError::Cancelled => TransportErrorKind::Timeout,
        TransferError::Stall => TransportErrorKind::Stall,
        TransferError::Disconnected => TransportErrorKind::Disconnected,
        _ => TransportErrorKind::Other,
    };
    TransportError::new(kind, e.to_string())
}
