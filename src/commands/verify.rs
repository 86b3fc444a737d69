//! Verify command implementation

use std::fs;
use std::path::Path;
use usbeeprom_core::{Eeprom, Transport};

use super::dump::read_range;
use super::{effective_count, progress_bar, CommandError};

/// Run the verify command
pub fn run_verify<T: Transport>(
    dev: &mut Eeprom<T>,
    input: &Path,
    start: u16,
    count: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let expected = fs::read(input)?;
    println!("Read {} bytes from {:?}", expected.len(), input);

    let count = effective_count(count, expected.len());
    let pb = progress_bar(count, "Verifying")?;
    let actual = read_range(dev, start, count, &pb)?;

    if let Some((offset, want, got)) = first_mismatch(&expected[..count], &actual) {
        pb.abandon_with_message("Verification failed!");
        return Err(CommandError::Mismatch {
            file: input.display().to_string(),
            offset,
            expected: want,
            actual: got,
        }
        .into());
    }

    pb.finish_with_message("Verification passed");
    println!("Verified {} bytes at 0x{:04X}", count, start);
    Ok(())
}

/// Locate the first differing byte as `(offset, expected, actual)`
pub fn first_mismatch(expected: &[u8], actual: &[u8]) -> Option<(usize, u8, u8)> {
    expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .map(|i| (i, expected[i], actual[i]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use usbeeprom_dummy::{DummyConfig, DummyProgrammer};

    #[test]
    fn test_first_mismatch() {
        assert_eq!(first_mismatch(&[1, 2, 3], &[1, 2, 3]), None);
        assert_eq!(first_mismatch(&[1, 2, 3], &[1, 9, 7]), Some((1, 2, 9)));
    }

    #[test]
    fn test_run_verify_against_file() {
        let path = std::env::temp_dir().join(format!("usbeeprom-verify-{}.bin", std::process::id()));
        fs::write(&path, [0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

        let mut image = vec![0xFFu8; 16];
        image[4..8].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let mut dev = Eeprom::new(DummyProgrammer::with_data(DummyConfig::default(), &image));

        run_verify(&mut dev, &path, 4, None).unwrap();

        let err = run_verify(&mut dev, &path, 0, None).unwrap_err();
        let mismatch = err.downcast_ref::<CommandError>().unwrap();
        assert!(matches!(
            mismatch,
            CommandError::Mismatch {
                offset: 0,
                expected: 0xDE,
                actual: 0xFF,
                ..
            }
        ));

        fs::remove_file(&path).unwrap();
    }
}
