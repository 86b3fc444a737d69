//! usbeeprom - command-line tool for USB EEPROM programmers
//!
//! Reads, writes, erases and verifies the 64 KiB address space of an EEPROM
//! attached to a programmer with VID:04d8 PID:f4cd. Every device command
//! opens the selected programmer, runs, and closes it again; a failed data
//! operation resets the programmer before the error is reported.

mod cli;
mod commands;
mod hexdump;

use clap::Parser;
use cli::{Cli, Commands};
use usbeeprom_core::{DeviceId, Eeprom};
use usbeeprom_nusb::{Context, NusbTransport};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> CommandResult {
    let cli = Cli::parse();

    // Verbosity sets the base level; RUST_LOG still overrides it
    env_logger::Builder::new()
        .filter_level(log_level(cli.verbose))
        .parse_default_env()
        .init();

    let ctx = Context::new();
    let id = cli.id;

    match cli.command {
        Commands::Dump { start, count, file } => with_device(&ctx, id, |dev| {
            commands::dump::run_dump(dev, start, count, file.as_deref())
        }),
        Commands::Erase => with_device(&ctx, id, commands::erase::run_erase),
        Commands::Reset => with_device(&ctx, id, commands::reset::run_reset),
        Commands::Verify { start, count, file } => with_device(&ctx, id, |dev| {
            commands::verify::run_verify(dev, &file, start, count)
        }),
        Commands::Write {
            start,
            count,
            page_size,
            file,
        } => with_device(&ctx, id, |dev| {
            commands::write::run_write(dev, &file, start, count, page_size)
        }),
        Commands::List => commands::list::run_list(&ctx),
    }
}

/// Log level selected by the number of `-v` flags
fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Open the programmer with the given ID, or the first one attached
fn open_device(ctx: &Context, id: Option<DeviceId>) -> usbeeprom_core::Result<Eeprom<NusbTransport>> {
    match id {
        Some(id) => ctx.open_id(id),
        None => ctx.first(),
    }
}

/// Run `f` against an opened programmer, closing it afterwards
fn with_device<F>(ctx: &Context, id: Option<DeviceId>, f: F) -> CommandResult
where
    F: FnOnce(&mut Eeprom<NusbTransport>) -> CommandResult,
{
    let mut dev = open_device(ctx, id)?;
    log::info!("Using programmer {}", dev.id());

    let result = f(&mut dev);

    let dev_id = dev.id();
    if let Err(e) = dev.close() {
        log::warn!("Failed to close {}: {}", dev_id, e);
    }

    result
}
