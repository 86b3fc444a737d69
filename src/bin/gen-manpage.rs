//! Render man pages for usbeeprom
//!
//! Writes `usbeeprom.1` plus one `usbeeprom-<command>.1` page per
//! subcommand into the given directory (default: `man`).
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
#[allow(dead_code)]
mod cli;

/// Render `cmd` into `<dir>/<title>.1`
fn render(cmd: clap::Command, title: &str, dir: &Path) -> io::Result<PathBuf> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd)
        .title(title.to_uppercase())
        .render(&mut buffer)?;

    let path = dir.join(format!("{}.1", title));
    fs::write(&path, buffer)?;
    Ok(path)
}

fn main() -> io::Result<()> {
    let output_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let mut pages = vec![render(cmd.clone(), "usbeeprom", &output_dir)?];

    for sub in cmd.get_subcommands() {
        let title = format!("usbeeprom-{}", sub.get_name());
        let sub = sub
            .clone()
            .bin_name(format!("usbeeprom {}", sub.get_name()));
        pages.push(render(sub, &title, &output_dir)?);
    }

    for page in &pages {
        println!("{}", page.display());
    }
    println!(
        "\n{} page(s) written; view with `man -l {}`",
        pages.len(),
        output_dir.join("usbeeprom.1").display()
    );

    Ok(())
}
