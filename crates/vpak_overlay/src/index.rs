//! Virtual file indexing across the two overlay sources.
//!
//! The [`FileIndex`] is built once when the overlay is mounted, by merging
//! two scans into one map keyed by [normalized path](crate::path::normalize):
//!
//! 1. **Loose files**: every regular file under the overlay directory,
//!    keyed by its path relative to that directory.
//! 2. **Archive entries**: the directory table of the vpak container,
//!    located at `<base>/<archiveName>` or `<base>/<overlayDir>/<archiveName>`.
//!
//! Loose files are inserted first and archive insertion skips keys that are
//! already present, so a loose file always shadows the archive entry at the
//! same path. Entry payloads are not read at index time; archive entries
//! only record their offset into the container.
//!
//! Indexing never fails outright. A missing overlay directory or archive
//! contributes nothing, and unreadable pieces are skipped with a warning.
//! An empty index means the overlay has nothing to serve and callers should
//! treat the engine as inert.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::fs::File;
use walkdir::WalkDir;

use crate::config::OverlayConfig;
use crate::path::normalize;

/// Where an indexed file's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// A real file under the overlay directory.
    Loose { path: Utf8PathBuf },
    /// A record inside the archive container, starting at `offset`.
    Archive { offset: u64 },
}

/// One virtual file known to the overlay.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Original-case relative path, kept for presentation and enumeration.
    pub relative_path: String,
    /// Logical size callers observe.
    pub decompressed_size: u64,
    /// Bytes physically present in the backing source.
    pub stored_size: u64,
    pub source: EntrySource,
}

impl IndexEntry {
    pub fn is_loose(&self) -> bool {
        matches!(self.source, EntrySource::Loose { .. })
    }

    /// Archive entries with `stored < decompressed` hold a compressed
    /// payload. Loose files are never compressed.
    pub fn is_compressed(&self) -> bool {
        self.stored_size < self.decompressed_size
    }
}

/// Map from normalized path key to its [`IndexEntry`].
#[derive(Default)]
pub struct FileIndex {
    entries: HashMap<String, IndexEntry>,
}

impl FileIndex {
    /// Build the index for `base_dir` and open the archive container.
    ///
    /// Returns the index together with the archive file handle, which stays
    /// open for the lifetime of the overlay so entry payloads can be read
    /// on demand. The handle is `None` when no archive was found or it
    /// failed to mount.
    pub fn build(base_dir: &Utf8Path, config: &OverlayConfig) -> (Self, Option<File>) {
        let mut index = Self::default();

        let overlay_root = base_dir.join(&config.overlay_dir);
        let loose_count = index.scan_loose(&overlay_root);
        let (archive_count, archive) = index.ingest_archive(base_dir, config);

        tracing::info!(
            "File index built: {} loose, {} archive, {} total entries",
            loose_count,
            archive_count,
            index.entries.len()
        );

        (index, archive)
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    /// Index every regular file under `overlay_root`. Returns the number of
    /// files indexed; a missing directory indexes nothing.
    fn scan_loose(&mut self, overlay_root: &Utf8Path) -> usize {
        if !overlay_root.as_std_path().is_dir() {
            tracing::debug!("No overlay directory at {}", overlay_root);
            return 0;
        }

        let mut count = 0;
        for entry in WalkDir::new(overlay_root.as_std_path()) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!("Skipping unreadable overlay entry: {}", error);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(path) => path,
                Err(path) => {
                    tracing::warn!("Skipping non-UTF-8 path: {}", path.display());
                    continue;
                }
            };
            let Ok(relative) = path.strip_prefix(overlay_root) else {
                continue;
            };
            let size = match path.as_std_path().metadata() {
                Ok(metadata) => metadata.len(),
                Err(error) => {
                    tracing::warn!("Skipping unreadable loose file '{}': {}", path, error);
                    continue;
                }
            };

            let key = normalize(relative.as_str());
            if key.is_empty() {
                continue;
            }

            let relative_path = relative.to_string();
            self.entries.entry(key).or_insert_with(|| IndexEntry {
                relative_path,
                decompressed_size: size,
                stored_size: size,
                source: EntrySource::Loose { path },
            });
            count += 1;
        }

        count
    }

    /// Mount the archive container and index its directory table, skipping
    /// keys already claimed by loose files. Returns the number of entries
    /// taken from the archive and the open archive handle.
    fn ingest_archive(
        &mut self,
        base_dir: &Utf8Path,
        config: &OverlayConfig,
    ) -> (usize, Option<File>) {
        let Some(archive_path) = locate_archive(base_dir, config) else {
            tracing::debug!("No archive '{}' under {}", config.archive_name, base_dir);
            return (0, None);
        };

        let file = match File::open(archive_path.as_std_path()) {
            Ok(file) => file,
            Err(error) => {
                tracing::warn!("Failed to open archive '{}': {}", archive_path, error);
                return (0, None);
            }
        };
        let vpak = match vpak::Vpak::mount_from_reader(file) {
            Ok(vpak) => vpak,
            Err(error) => {
                tracing::warn!("Failed to mount archive '{}': {}", archive_path, error);
                return (0, None);
            }
        };

        let mut count = 0;
        for entry in vpak.entries() {
            let key = normalize(&entry.path);
            if key.is_empty() {
                tracing::debug!("Skipping archive entry with empty path");
                continue;
            }
            if self.entries.contains_key(&key) {
                continue;
            }

            self.entries.insert(
                key,
                IndexEntry {
                    relative_path: entry.path.clone(),
                    decompressed_size: entry.decompressed_size as u64,
                    stored_size: entry.stored_size as u64,
                    source: EntrySource::Archive {
                        offset: entry.offset,
                    },
                },
            );
            count += 1;
        }

        tracing::debug!("Mounted archive '{}' with {} entries", archive_path, count);
        (count, Some(vpak.into_source()))
    }
}

/// Probe the archive locations in order: the base directory first, the
/// overlay directory second.
fn locate_archive(base_dir: &Utf8Path, config: &OverlayConfig) -> Option<Utf8PathBuf> {
    let candidates = [
        base_dir.join(&config.archive_name),
        base_dir.join(&config.overlay_dir).join(&config.archive_name),
    ];
    candidates
        .into_iter()
        .find(|path| path.as_std_path().is_file())
}
