//! Dump command implementation

use indicatif::ProgressBar;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use usbeeprom_core::protocol::validate_range;
use usbeeprom_core::{Eeprom, Transport, MAX_BYTES};

use super::{progress_bar, recover};
use crate::hexdump::write_hexdump;

/// Chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: usize = 4096;

/// Run the dump command
pub fn run_dump<T: Transport>(
    dev: &mut Eeprom<T>,
    start: u16,
    count: Option<usize>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let count = match count {
        Some(n) if n > 0 => n,
        _ => MAX_BYTES - start as usize,
    };

    let pb = progress_bar(count, "Reading")?;
    let data = read_range(dev, start, count, &pb)?;
    pb.finish_and_clear();

    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(&data)?;
            println!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_hexdump(&mut out, start as usize, &data)?;
            out.flush()?;
        }
    }

    Ok(())
}

/// Read `count` bytes from `start` in chunks, reporting progress.
///
/// On failure the device is reset and the read is abandoned.
pub fn read_range<T: Transport>(
    dev: &mut Eeprom<T>,
    start: u16,
    count: usize,
    pb: &ProgressBar,
) -> usbeeprom_core::Result<Vec<u8>> {
    validate_range(start, count)?;

    let mut data = vec![0u8; count];
    let mut offset = 0usize;
    while offset < count {
        let chunk_size = READ_CHUNK_SIZE.min(count - offset);
        let addr = (start as usize + offset) as u16;

        let result = dev.read(addr, &mut data[offset..offset + chunk_size]);
        if let Err(e) = recover(dev, result) {
            pb.abandon_with_message("Read failed");
            return Err(e);
        }

        offset += chunk_size;
        pb.set_position(offset as u64);
    }

    Ok(data)
}
