//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use usbeeprom_core::DeviceId;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a start address inside the 64 KiB address space
pub fn parse_address(s: &str) -> Result<u16, String> {
    let value = parse_hex_u32(s)?;
    u16::try_from(value)
        .map_err(|_| format!("Address 0x{:X} is outside the 64 KiB address space", value))
}

/// Parse a byte count
pub fn parse_size(s: &str) -> Result<usize, String> {
    parse_hex_u32(s).map(|v| v as usize)
}

#[derive(Parser)]
#[command(name = "usbeeprom")]
#[command(author, version, about = "USB EEPROM programmer tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Device to use, as bus:address (default: first supported device)
    #[arg(short, long, global = true)]
    pub id: Option<DeviceId>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dump contents of device as a hexdump, or raw to a file
    Dump {
        /// Starting address (hex, e.g., 0x100)
        #[arg(long, default_value = "0", value_parser = parse_address)]
        start: u16,

        /// Number of bytes to read (default: up to the end of the address space)
        #[arg(long, value_parser = parse_size)]
        count: Option<usize>,

        /// Write raw contents to this file instead of printing a hexdump
        file: Option<PathBuf>,
    },

    /// Erase contents of device
    Erase,

    /// Hard reset device
    Reset,

    /// Verify contents of device against a file
    Verify {
        /// Starting address (hex, e.g., 0x100)
        #[arg(long, default_value = "0", value_parser = parse_address)]
        start: u16,

        /// Number of bytes to verify (default: length of the file)
        #[arg(long, value_parser = parse_size)]
        count: Option<usize>,

        /// File to compare against
        file: PathBuf,
    },

    /// Write file to device
    Write {
        /// Starting address (hex, e.g., 0x100)
        #[arg(long, default_value = "0", value_parser = parse_address)]
        start: u16,

        /// Number of bytes to write (default: length of the file)
        #[arg(long, value_parser = parse_size)]
        count: Option<usize>,

        /// Page size for page writes (default: 0, page writes disabled)
        #[arg(long, default_value = "0", value_parser = parse_size)]
        page_size: usize,

        /// File to write
        file: PathBuf,
    },

    /// List attached programmers
    List,
}
