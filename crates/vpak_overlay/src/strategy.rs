//! Open strategies for archive-backed entries.
//!
//! Loose files are always opened as plain OS files. Archive entries go
//! through an [`OpenStrategy`] chosen once when the overlay is mounted:
//! [`DirectOpen`] serves them from memory or straight from the container,
//! [`StagedOpen`] extracts them into an on-disk cache and serves the cached
//! copy. The strategy decides only how a handle is backed; read and seek
//! behavior on the resulting [`Backing`] is identical.

use camino::Utf8PathBuf;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;
use crate::index::IndexEntry;

/// What an open handle reads from.
pub enum Backing {
    /// Entry decompressed into an owned buffer at open time.
    Memory(Vec<u8>),
    /// Raw entry served directly from the shared archive handle.
    Archive { offset: u64 },
    /// A real file on disk (loose files and staged extractions).
    Real(File),
}

/// Materializes archive entries into handle backings.
pub trait OpenStrategy: Send {
    fn materialize(&self, entry: &IndexEntry, offset: u64, archive: &mut File) -> Result<Backing>;

    /// Called once at shutdown to discard anything the strategy put on disk.
    fn cleanup(&self) {}
}

/// Serve compressed entries from a decompression buffer and raw entries by
/// seeking the shared archive handle on every read.
pub struct DirectOpen;

impl OpenStrategy for DirectOpen {
    fn materialize(&self, entry: &IndexEntry, offset: u64, archive: &mut File) -> Result<Backing> {
        if entry.is_compressed() {
            let stored = read_stored(archive, offset, entry.stored_size)?;
            let data = vpak::codec::decompress(&stored, entry.decompressed_size as usize)?;
            Ok(Backing::Memory(data))
        } else {
            Ok(Backing::Archive { offset })
        }
    }
}

/// Extract entries into a cache directory on first open and serve the
/// cached file. Repeat opens of the same entry reuse the extraction.
pub struct StagedOpen {
    cache_dir: Utf8PathBuf,
}

impl StagedOpen {
    pub fn new(cache_dir: Utf8PathBuf) -> Result<Self> {
        std::fs::create_dir_all(cache_dir.as_std_path())?;
        Ok(Self { cache_dir })
    }

    /// The archive offset is unique per entry, so it doubles as the cache
    /// filename.
    fn cache_path(&self, offset: u64) -> Utf8PathBuf {
        self.cache_dir.join(format!("vpak_{offset}.tmp"))
    }
}

impl OpenStrategy for StagedOpen {
    fn materialize(&self, entry: &IndexEntry, offset: u64, archive: &mut File) -> Result<Backing> {
        let cache_path = self.cache_path(offset);

        if !cache_path.as_std_path().exists() {
            let stored = read_stored(archive, offset, entry.stored_size)?;
            let data = if entry.is_compressed() {
                vpak::codec::decompress(&stored, entry.decompressed_size as usize)?
            } else {
                stored
            };
            std::fs::write(cache_path.as_std_path(), &data)?;
            tracing::debug!("Staged '{}' to {}", entry.relative_path, cache_path);
        }

        Ok(Backing::Real(File::open(cache_path.as_std_path())?))
    }

    fn cleanup(&self) {
        if let Err(error) = std::fs::remove_dir_all(self.cache_dir.as_std_path()) {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove cache dir {}: {}", self.cache_dir, error);
            }
        }
    }
}

/// Read an entry's stored bytes from the archive at `offset`.
pub(crate) fn read_stored(archive: &mut File, offset: u64, stored_size: u64) -> Result<Vec<u8>> {
    archive.seek(SeekFrom::Start(offset))?;
    let mut data = vec![0u8; stored_size as usize];
    archive.read_exact(&mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EntrySource;
    use std::io::Write;

    fn archive_fixture(dir: &std::path::Path) -> (File, Vec<IndexEntry>) {
        let archive_path = dir.join("data.vpak");
        let mut file = File::create(&archive_path).unwrap();
        let compressible = b"compress me ".repeat(100);
        vpak::VpakBuilder::default()
            .with_entry("big.bin")
            .with_entry("small.txt")
            .build_to_writer(&mut file, |path, cursor| {
                match path {
                    "big.bin" => cursor.write_all(&compressible)?,
                    _ => cursor.write_all(b"tiny")?,
                }
                Ok(())
            })
            .unwrap();
        drop(file);

        let vpak = vpak::Vpak::mount_from_reader(File::open(&archive_path).unwrap()).unwrap();
        let entries = vpak
            .entries()
            .iter()
            .map(|entry| IndexEntry {
                relative_path: entry.path.clone(),
                decompressed_size: entry.decompressed_size as u64,
                stored_size: entry.stored_size as u64,
                source: EntrySource::Archive {
                    offset: entry.offset,
                },
            })
            .collect();
        (vpak.into_source(), entries)
    }

    fn offset_of(entry: &IndexEntry) -> u64 {
        match entry.source {
            EntrySource::Archive { offset } => offset,
            EntrySource::Loose { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_direct_backings() {
        let temp = tempfile::tempdir().unwrap();
        let (mut archive, entries) = archive_fixture(temp.path());

        let compressed = &entries[0];
        assert!(compressed.is_compressed());
        match DirectOpen
            .materialize(compressed, offset_of(compressed), &mut archive)
            .unwrap()
        {
            Backing::Memory(data) => assert_eq!(data, b"compress me ".repeat(100)),
            _ => panic!("compressed entry should be memory-backed"),
        }

        let raw = &entries[1];
        assert!(!raw.is_compressed());
        match DirectOpen
            .materialize(raw, offset_of(raw), &mut archive)
            .unwrap()
        {
            Backing::Archive { offset } => assert_eq!(offset, offset_of(raw)),
            _ => panic!("raw entry should be archive-backed"),
        }
    }

    #[test]
    fn test_staged_extracts_and_reuses() {
        let temp = tempfile::tempdir().unwrap();
        let (mut archive, entries) = archive_fixture(temp.path());
        let cache_dir = Utf8PathBuf::from_path_buf(temp.path().join("cache")).unwrap();

        let staged = StagedOpen::new(cache_dir.clone()).unwrap();
        let entry = &entries[0];
        let offset = offset_of(entry);

        let backing = staged.materialize(entry, offset, &mut archive).unwrap();
        assert!(matches!(backing, Backing::Real(_)));

        let cache_file = cache_dir.join(format!("vpak_{offset}.tmp"));
        assert_eq!(
            std::fs::read(cache_file.as_std_path()).unwrap(),
            b"compress me ".repeat(100)
        );

        // A second open serves the existing cache file rather than
        // re-extracting; prove it by altering the cached copy.
        std::fs::write(cache_file.as_std_path(), b"altered").unwrap();
        let mut reopened = match staged.materialize(entry, offset, &mut archive).unwrap() {
            Backing::Real(file) => file,
            _ => panic!("staged entry should be file-backed"),
        };
        let mut contents = String::new();
        reopened.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "altered");
    }

    #[test]
    fn test_staged_cleanup_removes_cache() {
        let temp = tempfile::tempdir().unwrap();
        let (mut archive, entries) = archive_fixture(temp.path());
        let cache_dir = Utf8PathBuf::from_path_buf(temp.path().join("cache")).unwrap();

        let staged = StagedOpen::new(cache_dir.clone()).unwrap();
        let entry = &entries[1];
        staged
            .materialize(entry, offset_of(entry), &mut archive)
            .unwrap();
        assert!(cache_dir.as_std_path().exists());

        staged.cleanup();
        assert!(!cache_dir.as_std_path().exists());

        // Cleaning up twice is quiet.
        staged.cleanup();
    }

    #[test]
    fn test_corrupt_payload_fails_materialize() {
        let temp = tempfile::tempdir().unwrap();
        let (mut archive, entries) = archive_fixture(temp.path());

        // Lie about the offset so the decompressor sees garbage.
        let entry = &entries[0];
        let result = DirectOpen.materialize(entry, offset_of(entry) + 7, &mut archive);
        assert!(result.is_err());
    }
}
