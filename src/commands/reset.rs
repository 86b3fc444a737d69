//! Reset command implementation

use usbeeprom_core::{Eeprom, Transport};

/// Run the reset command
pub fn run_reset<T: Transport>(dev: &mut Eeprom<T>) -> Result<(), Box<dyn std::error::Error>> {
    dev.reset()?;
    println!("Reset {}", dev.id());
    Ok(())
}
