//! Write command implementation

use std::fs;
use std::path::Path;
use usbeeprom_core::{Eeprom, Transport};

use super::{effective_count, recover, spinner};

/// Run the write command
pub fn run_write<T: Transport>(
    dev: &mut Eeprom<T>,
    input: &Path,
    start: u16,
    count: Option<usize>,
    page_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    println!("Read {} bytes from {:?}", data.len(), input);

    let count = effective_count(count, data.len());
    let pb = spinner(format!("Writing {} bytes at 0x{:04X}...", count, start))?;

    if let Err(e) = write_data(dev, start, &data[..count], page_size) {
        pb.abandon_with_message("Write failed");
        return Err(e.into());
    }

    pb.finish_with_message(format!("Wrote {} bytes", count));
    Ok(())
}

/// Write `data` at `start`, using page writes when `page_size` is non-zero
pub fn write_data<T: Transport>(
    dev: &mut Eeprom<T>,
    start: u16,
    data: &[u8],
    page_size: usize,
) -> usbeeprom_core::Result<()> {
    let result = if page_size > 0 {
        dev.set_page_size(page_size);
        dev.write_pages(start, data)
    } else {
        dev.write_bytes(start, data)
    };
    recover(dev, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use usbeeprom_core::{Endpoint, Error};
    use usbeeprom_dummy::DummyProgrammer;

    #[test]
    fn test_write_data_bytes() {
        let mut dev = Eeprom::new(DummyProgrammer::new_default());

        write_data(&mut dev, 0x40, &[1, 2, 3], 0).unwrap();

        assert_eq!(&dev.transport().memory()[0x40..0x43], &[1, 2, 3]);
        assert_eq!(dev.transport().transfers()[0].len, 5);
    }

    #[test]
    fn test_write_data_pages() {
        let mut dev = Eeprom::new(DummyProgrammer::new_default());

        write_data(&mut dev, 0, &[7u8; 100], 32).unwrap();

        let out: Vec<_> = dev
            .transport()
            .transfers()
            .iter()
            .filter(|t| t.endpoint == Endpoint::Out)
            .map(|t| t.len)
            .collect();
        assert_eq!(out, vec![5, 32, 32, 32, 4]);
        assert_eq!(&dev.transport().memory()[..100], &[7u8; 100][..]);
    }

    #[test]
    fn test_write_data_rejects_oversized_page() {
        let mut dev = Eeprom::new(DummyProgrammer::new_default());

        let err = write_data(&mut dev, 0, &[0u8; 256], 128).unwrap_err();

        assert!(matches!(err, Error::InvalidChunkSize { .. }));
        assert_eq!(dev.transport().resets(), 0);
    }

    #[test]
    fn test_run_write_from_file() {
        let path = std::env::temp_dir().join(format!("usbeeprom-write-{}.bin", std::process::id()));
        fs::write(&path, (0u8..=255).collect::<Vec<_>>()).unwrap();
        let mut dev = Eeprom::new(DummyProgrammer::new_default());

        run_write(&mut dev, &path, 0x1000, Some(16), 0).unwrap();

        let memory = dev.transport().memory();
        assert_eq!(&memory[0x1000..0x1010], &(0u8..16).collect::<Vec<_>>()[..]);
        assert_eq!(memory[0x1010], 0xFF);

        fs::remove_file(&path).unwrap();
    }
}
