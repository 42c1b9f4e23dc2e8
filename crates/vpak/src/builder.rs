//! Forward-pass archive writer.
//!
//! The container has no table of contents to patch up, so building is a
//! single pass: the record count, then each record's header and payload in
//! declaration order. Entry bytes come from a caller-supplied provider so
//! the builder never dictates where content is stored.

use byteorder::{WriteBytesExt, LE};
use std::io::{self, BufWriter, Cursor, Write};

use crate::codec;
use crate::error::{Result, VpakError};
use crate::MAX_PATH_LEN;

/// Payloads at or below this many bytes are always stored raw; a zstd frame
/// header alone eats most of any gain at that size.
pub const COMPRESS_MIN_SIZE: usize = 64;

/// Collects entry paths and writes them out as a vpak archive.
///
/// # Example
///
/// ```
/// use std::io::{Cursor, Write};
/// use vpak::VpakBuilder;
///
/// let mut out = Cursor::new(Vec::new());
/// VpakBuilder::default()
///     .with_entry("data/strings.bin")
///     .build_to_writer(&mut out, |_path, cursor| {
///         cursor.write_all(b"entry content")?;
///         Ok(())
///     })
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct VpakBuilder {
    entries: Vec<String>,
}

impl VpakBuilder {
    /// Queue an entry. The path is written to the directory verbatim;
    /// archive convention is relative, forward-slash paths.
    pub fn with_entry(mut self, path: impl Into<String>) -> Self {
        self.entries.push(path.into());
        self
    }

    /// Number of queued entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Build the archive and write it to `writer`.
    ///
    /// `provide_entry_data` supplies each entry's uncompressed bytes.
    /// Payloads longer than [`COMPRESS_MIN_SIZE`] are zstd-compressed, and
    /// the compressed form is kept only when strictly smaller than the
    /// original; readers infer compression from `stored < decompressed`, so
    /// an equal-size frame would be indistinguishable from raw data.
    pub fn build_to_writer<TWriter, TEntryDataProvider>(
        self,
        writer: &mut TWriter,
        provide_entry_data: TEntryDataProvider,
    ) -> Result<()>
    where
        TWriter: io::Write,
        TEntryDataProvider: Fn(&str, &mut Cursor<Vec<u8>>) -> Result<()>,
    {
        let mut writer = BufWriter::new(writer);

        let count = i32::try_from(self.entries.len()).map_err(|_| {
            VpakError::InvalidRecord(format!("too many entries: {}", self.entries.len()))
        })?;
        writer.write_i32::<LE>(count)?;

        for path in &self.entries {
            if path.len() > MAX_PATH_LEN {
                return Err(VpakError::InvalidRecord(format!(
                    "path length {} out of range",
                    path.len()
                )));
            }

            let mut data_writer = Cursor::new(Vec::new());
            provide_entry_data(path, &mut data_writer)?;
            let data = data_writer.into_inner();

            let (payload, decompressed_size) = pack_payload(&data)?;

            writer.write_i32::<LE>(path.len() as i32)?;
            writer.write_all(path.as_bytes())?;
            writer.write_i32::<LE>(decompressed_size)?;
            writer.write_i32::<LE>(payload.len() as i32)?;
            writer.write_all(&payload)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Apply the compression policy: raw below the size floor, compressed only
/// when it actually shrinks the data.
fn pack_payload(data: &[u8]) -> Result<(Vec<u8>, i32)> {
    let decompressed_size = i32::try_from(data.len()).map_err(|_| {
        VpakError::InvalidRecord(format!("entry of {} bytes exceeds the format", data.len()))
    })?;

    if data.len() <= COMPRESS_MIN_SIZE {
        return Ok((data.to_vec(), decompressed_size));
    }

    let compressed = codec::compress(data)?;
    if compressed.len() < data.len() {
        Ok((compressed, decompressed_size))
    } else {
        Ok((data.to_vec(), decompressed_size))
    }
}
