//! Whole-buffer compression for archive payloads.
//!
//! Payloads are single zstd frames, compressed and decompressed in one shot.
//! There is no streaming mode: the format records a payload's exact logical
//! size, and consumers that need partial reads decompress once and slice the
//! resulting buffer.

use crate::error::{Result, VpakError};
use std::io::Write;

/// Compress data as one zstd frame (level 3).
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = zstd::Encoder::new(std::io::BufWriter::new(&mut out), 3)?;
    encoder.write_all(data)?;
    encoder.finish()?.flush()?;
    Ok(out)
}

/// Decompress a whole payload and verify it against the size the directory
/// record declared. A mismatch is corruption; the output is never truncated
/// or padded to fit.
pub fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let out = zstd::decode_all(data)?;
    if out.len() != expected_size {
        return Err(VpakError::SizeMismatch {
            expected: expected_size,
            actual: out.len(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let data = b"the quick brown fox".repeat(50);
        let compressed = compress(&data).unwrap();
        assert!(compressed.len() < data.len());

        let restored = decompress(&compressed, data.len()).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        let data = b"payload bytes".repeat(20);
        let compressed = compress(&data).unwrap();

        let err = decompress(&compressed, data.len() + 1).unwrap_err();
        assert!(matches!(
            err,
            VpakError::SizeMismatch { expected, actual }
                if expected == data.len() + 1 && actual == data.len()
        ));
    }

    #[test]
    fn test_garbage_input_fails() {
        assert!(decompress(&[0x01, 0x02, 0x03, 0x04], 16).is_err());
    }
}
