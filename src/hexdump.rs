//! Canonical hex+ASCII dump output

use std::io::{self, Write};

const BYTES_PER_LINE: usize = 16;

/// Write `data` as a hexdump, labelling lines from address `base`
pub fn write_hexdump<W: Write + ?Sized>(out: &mut W, base: usize, data: &[u8]) -> io::Result<()> {
    for (i, line) in data.chunks(BYTES_PER_LINE).enumerate() {
        write!(out, "{:08x} ", base + i * BYTES_PER_LINE)?;

        for j in 0..BYTES_PER_LINE {
            if j == BYTES_PER_LINE / 2 {
                write!(out, " ")?;
            }
            match line.get(j) {
                Some(b) => write!(out, " {:02x}", b)?,
                None => write!(out, "   ")?,
            }
        }

        write!(out, "  |")?;
        for &b in line {
            let c = if (0x20..0x7f).contains(&b) { b } else { b'.' };
            out.write_all(&[c])?;
        }
        writeln!(out, "|")?;
    }
    Ok(())
}
