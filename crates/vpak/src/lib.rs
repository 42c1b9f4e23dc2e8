//! Reader, writer and extractor for the vpak packed-file container.
//!
//! A vpak archive is a flat little-endian stream: a record count followed by
//! one record per file.
//!
//! ```text
//! i32                file count
//! per record:
//!   i32              path length in bytes
//!   u8[pathLength]   relative path (UTF-8, either slash style)
//!   i32              decompressed size
//!   i32              stored size (== decompressed size for raw payloads)
//!   u8[storedSize]   payload (zstd frame when stored < decompressed)
//! ```
//!
//! Mounting reads only the directory records; each payload's byte offset is
//! remembered so entry data can be loaded on demand through the kept byte
//! source. Records may repeat a path; consumers resolve duplicates by
//! taking the first occurrence.
//!
//! # Example
//!
//! ```no_run
//! use vpak::Vpak;
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = File::open("data.vpak")?;
//! let mut vpak = Vpak::mount_from_reader(file)?;
//!
//! let entry = vpak.entries()[0].clone();
//! let data = vpak.load_entry_data(&entry)?;
//! println!("{}: {} bytes", entry.path, data.len());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod codec;
pub mod error;
pub mod extract;
mod read;

pub use builder::VpakBuilder;
pub use error::{Result, VpakError};
pub use extract::VpakExtractor;

use std::io::{Read, Seek, SeekFrom};

/// Longest path a directory record may carry. Anything larger is treated as
/// corruption by the reader and rejected by the writer.
pub(crate) const MAX_PATH_LEN: usize = 4096;

/// Directory record for one archived file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpakEntry {
    /// Relative path as written by the packer (original case, either slash
    /// style).
    pub path: String,

    /// Logical size after decompression.
    pub decompressed_size: u32,

    /// Bytes physically present in the archive.
    pub stored_size: u32,

    /// Byte offset of the payload within the archive.
    pub offset: u64,
}

impl VpakEntry {
    /// Whether the payload is stored as a zstd frame. Raw payloads occupy
    /// exactly their logical size, so a smaller stored size is the only
    /// compression marker the format has.
    pub fn is_compressed(&self) -> bool {
        self.stored_size < self.decompressed_size
    }
}

/// A mounted vpak archive.
///
/// Holds the directory records plus the byte source they came from, so
/// payloads can be read lazily. Mount with [`Vpak::mount_from_reader`] (the
/// current format) or [`Vpak::mount_lenient`] (also accepts the old
/// single-size record shape).
#[derive(Debug)]
pub struct Vpak<TSource: Read + Seek> {
    entries: Vec<VpakEntry>,
    source: TSource,
}

impl<TSource: Read + Seek> Vpak<TSource> {
    /// Directory records in archive order, duplicates included.
    pub fn entries(&self) -> &[VpakEntry] {
        &self.entries
    }

    /// Read an entry's payload exactly as stored, without decompressing.
    pub fn load_entry_raw(&mut self, entry: &VpakEntry) -> Result<Vec<u8>> {
        self.source.seek(SeekFrom::Start(entry.offset))?;
        let mut data = vec![0u8; entry.stored_size as usize];
        self.source.read_exact(&mut data)?;
        Ok(data)
    }

    /// Read an entry's payload, decompressing it if stored compressed.
    pub fn load_entry_data(&mut self, entry: &VpakEntry) -> Result<Vec<u8>> {
        let stored = self.load_entry_raw(entry)?;
        if entry.is_compressed() {
            codec::decompress(&stored, entry.decompressed_size as usize)
        } else {
            Ok(stored)
        }
    }

    /// Discard the directory and hand back the underlying byte source,
    /// positioned wherever the last read left it.
    pub fn into_source(self) -> TSource {
        self.source
    }
}
