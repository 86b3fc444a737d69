//! List command implementation

use usbeeprom_core::Error;
use usbeeprom_nusb::Context;

/// Print the ID of every attached programmer
pub fn run_list(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let ids = match ctx.devices() {
        Ok(ids) => ids,
        Err(Error::DeviceNotFound) => {
            println!("No programmers found ({})", ctx.filter());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Attached programmers ({}):", ctx.filter());
    println!();
    for id in ids {
        println!("  {}", id);
    }

    Ok(())
}
