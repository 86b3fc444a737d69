//! CLI command implementations
//!
//! Device commands are generic over [`Transport`] so they run unchanged
//! against real hardware and the in-memory emulator. Any failed data
//! operation is followed by a device reset before the error is returned.

pub mod dump;
pub mod erase;
pub mod list;
pub mod reset;
pub mod verify;
pub mod write;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use thiserror::Error;
use usbeeprom_core::{Eeprom, Transport};

/// Errors produced by the command layer itself
#[derive(Debug, Error)]
pub enum CommandError {
    /// Device contents differ from the reference file
    #[error("{file}:{offset}: expected {expected:#x}; got {actual:#x}")]
    Mismatch {
        /// Reference file name
        file: String,
        /// Offset of the first differing byte
        offset: usize,
        /// Byte in the file
        expected: u8,
        /// Byte read from the device
        actual: u8,
    },
}

/// Reset the device if `result` is a failure that involved I/O.
///
/// The reset result is only logged; the original error is returned.
pub fn recover<T: Transport, R>(
    dev: &mut Eeprom<T>,
    result: usbeeprom_core::Result<R>,
) -> usbeeprom_core::Result<R> {
    if let Err(e) = &result {
        if !e.is_validation() {
            log::debug!("Operation failed ({}), resetting {}", e, dev.id());
            if let Err(reset_err) = dev.reset() {
                log::warn!("Reset of {} failed: {}", dev.id(), reset_err);
            }
        }
    }
    result
}

/// Resolve an optional `--count` against the available length.
///
/// 0 or a count larger than `available` selects `available`.
pub fn effective_count(count: Option<usize>, available: usize) -> usize {
    match count {
        Some(n) if n > 0 && n <= available => n,
        _ => available,
    }
}

/// Spinner for operations without intermediate progress
pub fn spinner(message: String) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Byte progress bar for chunked reads
pub fn progress_bar(total: usize, phase: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}
