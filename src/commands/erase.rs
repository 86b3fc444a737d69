//! Erase command implementation

use usbeeprom_core::{Eeprom, Transport};

use super::{recover, spinner};

/// Run the erase command
pub fn run_erase<T: Transport>(dev: &mut Eeprom<T>) -> Result<(), Box<dyn std::error::Error>> {
    let pb = spinner(format!("Erasing {} (this may take a while)...", dev.id()))?;

    let result = dev.erase();
    if let Err(e) = recover(dev, result) {
        pb.abandon_with_message("Erase failed");
        return Err(e.into());
    }

    pb.finish_with_message("Chip erase complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use usbeeprom_dummy::{DummyConfig, DummyProgrammer, ERASED_VALUE};

    #[test]
    fn test_run_erase() {
        let mut dev = Eeprom::new(DummyProgrammer::with_data(DummyConfig::default(), &[0u8; 64]));

        run_erase(&mut dev).unwrap();

        assert!(dev.transport().memory().iter().all(|&b| b == ERASED_VALUE));
    }
}
