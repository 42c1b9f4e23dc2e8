//! The overlay facade.
//!
//! [`Overlay`] owns everything the engine needs to serve virtual files: the
//! [`FileIndex`], the shared archive handle, the open strategy and the two
//! handle tables. It is constructed by [`Overlay::mount`] and torn down by
//! [`Overlay::shutdown`] or drop, with no global state anywhere, so tests
//! can run any number of independent instances side by side.
//!
//! All public operations take `&self` and synchronize on one internal lock.
//! Calls are short and synchronous; the expectation is a host that issues
//! file I/O from one or a few threads and cannot tolerate a panic crossing
//! the API boundary, so every failure comes back as an [`Error`] value.
//!
//! Handles returned to callers are opaque `u64`-sized values tagged by
//! table (see [`crate::table`]); a caller holding an arbitrary value can
//! cheaply pre-filter with [`Overlay::could_be_overlay_handle`] before
//! paying for a lookup.

use camino::{Utf8Path, Utf8PathBuf};
use encoding_rs::Encoding;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Mutex, MutexGuard};

use crate::config::{OpenMode, OverlayConfig};
use crate::error::{Error, Result};
use crate::find::{self, FindCursor, FindData};
use crate::index::{EntrySource, FileIndex, IndexEntry};
use crate::path::{normalize, normalize_encoded};
use crate::strategy::{self, Backing, DirectOpen, OpenStrategy, StagedOpen};
use crate::table::{self, HandleTable, FILE_TAG, FIND_TAG};

/// Opaque handle to an open virtual file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(u64);

impl FileHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Opaque handle to a directory enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FindHandle(u64);

impl FindHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Metadata reported for an open virtual file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub file_size: u64,
    pub read_only: bool,
    pub links: u32,
}

/// Reported file type. Virtual files always report [`FileKind::Disk`]; the
/// other variants exist for callers that mirror the full OS enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Unknown,
    Disk,
    CharacterDevice,
    Pipe,
}

/// Open-file state owned by the file handle table.
struct OpenFile {
    entry: IndexEntry,
    /// Logical position, kept in `[0, decompressed_size]`.
    position: u64,
    backing: Backing,
}

struct OverlayInner {
    base_dir: Utf8PathBuf,
    index: FileIndex,
    /// Shared handle to the archive container, `None` when no archive was
    /// found or after shutdown.
    archive: Option<File>,
    strategy: Box<dyn OpenStrategy>,
    files: HandleTable<OpenFile>,
    cursors: HandleTable<FindCursor>,
    shut_down: bool,
}

/// A mounted virtual filesystem overlay.
pub struct Overlay {
    inner: Mutex<OverlayInner>,
    encoding: &'static Encoding,
}

impl Overlay {
    /// Build the index for `base_dir` and mount the overlay.
    ///
    /// Mounting never fails because of missing content; an overlay with
    /// nothing to serve is simply inert (see [`Overlay::is_active`]).
    pub fn mount(base_dir: impl AsRef<Utf8Path>, config: &OverlayConfig) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let (index, archive) = FileIndex::build(&base_dir, config);

        let strategy: Box<dyn OpenStrategy> = match config.open_mode {
            OpenMode::Direct => Box::new(DirectOpen),
            OpenMode::Staged => Box::new(StagedOpen::new(base_dir.join(&config.cache_dir))?),
        };

        tracing::info!(
            "Overlay mounted at {} with {} virtual files",
            base_dir,
            index.len()
        );

        Ok(Self {
            inner: Mutex::new(OverlayInner {
                base_dir,
                index,
                archive,
                strategy,
                files: HandleTable::new(FILE_TAG),
                cursors: HandleTable::new(FIND_TAG),
                shut_down: false,
            }),
            encoding: config.resolved_encoding(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, OverlayInner>> {
        self.inner
            .lock()
            .map_err(|error| Error::Internal(error.to_string()))
    }

    /// `true` when the overlay has at least one virtual file to serve.
    /// Inactive overlays should be bypassed entirely by the caller.
    pub fn is_active(&self) -> bool {
        self.lock()
            .map(|inner| !inner.index.is_empty())
            .unwrap_or(false)
    }

    /// Does the overlay manage a file at `path`?
    pub fn has_file(&self, path: &str) -> bool {
        self.lock()
            .map(|inner| inner.index.get(&normalize(path)).is_some())
            .unwrap_or(false)
    }

    /// [`Overlay::has_file`] for raw path bytes in the configured code page.
    pub fn has_file_encoded(&self, raw_path: &[u8]) -> bool {
        let key = normalize_encoded(raw_path, self.encoding);
        self.lock()
            .map(|inner| inner.index.get(&key).is_some())
            .unwrap_or(false)
    }

    /// Open a virtual file.
    ///
    /// Returns `Ok(None)` when the path is not managed by the overlay or
    /// its content cannot be served; the caller is expected to fall back to
    /// the real filesystem in both cases.
    pub fn open(&self, path: &str) -> Result<Option<FileHandle>> {
        self.lock()?.open_key(&normalize(path))
    }

    /// [`Overlay::open`] for raw path bytes in the configured code page.
    pub fn open_encoded(&self, raw_path: &[u8]) -> Result<Option<FileHandle>> {
        let key = normalize_encoded(raw_path, self.encoding);
        self.lock()?.open_key(&key)
    }

    /// Read up to `buf.len()` bytes at the handle's current position.
    ///
    /// A single underlying transfer is made; the returned count may be
    /// short. `Ok(0)` at end of file is success, not an error.
    pub fn read(&self, handle: FileHandle, buf: &mut [u8]) -> Result<usize> {
        self.lock()?.read(handle, buf)
    }

    /// Move the handle's position, clamping the target to
    /// `[0, decompressed_size]`. Returns the resulting absolute position.
    pub fn seek(&self, handle: FileHandle, pos: SeekFrom) -> Result<u64> {
        self.lock()?.seek(handle, pos)
    }

    /// Logical size of the open file.
    pub fn size(&self, handle: FileHandle) -> Result<u64> {
        let inner = self.lock()?;
        let file = inner
            .files
            .get(handle.as_raw())
            .ok_or(Error::InvalidHandle(handle.as_raw()))?;
        Ok(file.entry.decompressed_size)
    }

    /// Metadata for the open file. Virtual files are always read-only
    /// single-link disk files, whatever their backing.
    pub fn file_info(&self, handle: FileHandle) -> Result<FileInfo> {
        Ok(FileInfo {
            file_size: self.size(handle)?,
            read_only: true,
            links: 1,
        })
    }

    pub fn file_kind(&self, handle: FileHandle) -> Result<FileKind> {
        let inner = self.lock()?;
        if !inner.files.contains(handle.as_raw()) {
            return Err(Error::InvalidHandle(handle.as_raw()));
        }
        Ok(FileKind::Disk)
    }

    /// Writing through the overlay is never supported, but the handle is
    /// still validated so callers can distinguish the two failures.
    pub fn write(&self, handle: FileHandle, _buf: &[u8]) -> Result<usize> {
        let inner = self.lock()?;
        if !inner.files.contains(handle.as_raw()) {
            return Err(Error::InvalidHandle(handle.as_raw()));
        }
        Err(Error::Unsupported("write on a read-only overlay"))
    }

    /// Close an open file, releasing its backing.
    pub fn close(&self, handle: FileHandle) -> Result<()> {
        self.lock()?
            .files
            .remove(handle.as_raw())
            .map(|_| ())
            .ok_or(Error::InvalidHandle(handle.as_raw()))
    }

    /// Start a directory enumeration for `pattern` and return the cursor
    /// together with its first result.
    ///
    /// The pattern's directory part may be absolute or relative to the
    /// base directory; the filename part is a glob mask. Fails with
    /// [`Error::NotFound`] when neither the real directory nor the index
    /// has a match.
    pub fn find_first(&self, pattern: &str) -> Result<(FindHandle, FindData)> {
        self.lock()?.find_first(pattern)
    }

    /// Next enumeration result, or `Ok(None)` when the listing is done.
    pub fn find_next(&self, handle: FindHandle) -> Result<Option<FindData>> {
        let mut inner = self.lock()?;
        let cursor = inner
            .cursors
            .get_mut(handle.as_raw())
            .ok_or(Error::InvalidHandle(handle.as_raw()))?;
        Ok(cursor.advance())
    }

    /// Discard an enumeration cursor.
    pub fn find_close(&self, handle: FindHandle) -> Result<()> {
        self.lock()?
            .cursors
            .remove(handle.as_raw())
            .map(|_| ())
            .ok_or(Error::InvalidHandle(handle.as_raw()))
    }

    /// Materialize a virtual file as a real file at `dest`, decompressing
    /// if needed. Collaborators use this when they need a genuine OS path.
    pub fn extract_file(&self, path: &str, dest: impl AsRef<Utf8Path>) -> Result<()> {
        self.lock()?.extract_file(&normalize(path), dest.as_ref())
    }

    /// Cheap tag check: could `raw` have been issued by any overlay?
    /// A `true` result still requires [`Overlay::is_overlay_handle`] to
    /// confirm liveness.
    pub fn could_be_overlay_handle(raw: u64) -> bool {
        matches!(table::tag_of(raw), FILE_TAG | FIND_TAG)
    }

    /// Is `raw` a live handle or cursor of this overlay?
    pub fn is_overlay_handle(&self, raw: u64) -> bool {
        self.lock()
            .map(|inner| inner.files.contains(raw) || inner.cursors.contains(raw))
            .unwrap_or(false)
    }

    /// Release every handle, drop the archive and index, and remove any
    /// staged cache. The overlay reports inactive afterwards.
    pub fn shutdown(&self) -> Result<()> {
        self.lock()?.teardown();
        Ok(())
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.teardown();
    }
}

impl OverlayInner {
    fn open_key(&mut self, key: &str) -> Result<Option<FileHandle>> {
        let Some(entry) = self.index.get(key) else {
            return Ok(None);
        };
        let entry = entry.clone();

        let backing = match &entry.source {
            EntrySource::Loose { path } => match File::open(path.as_std_path()) {
                Ok(file) => Backing::Real(file),
                Err(error) => {
                    tracing::warn!("Failed to open loose file '{}': {}", path, error);
                    return Ok(None);
                }
            },
            EntrySource::Archive { offset } => {
                let Some(archive) = self.archive.as_mut() else {
                    return Ok(None);
                };
                match self.strategy.materialize(&entry, *offset, archive) {
                    Ok(backing) => backing,
                    Err(error) => {
                        tracing::warn!(
                            "Failed to materialize '{}': {}",
                            entry.relative_path,
                            error
                        );
                        return Ok(None);
                    }
                }
            }
        };

        let raw = self.files.insert(OpenFile {
            entry,
            position: 0,
            backing,
        });
        tracing::trace!("Opened virtual file as {:#018x}", raw);
        Ok(Some(FileHandle::from_raw(raw)))
    }

    fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> Result<usize> {
        let file = self
            .files
            .get_mut(handle.as_raw())
            .ok_or(Error::InvalidHandle(handle.as_raw()))?;

        let remaining = file.entry.decompressed_size.saturating_sub(file.position);
        let to_read = (buf.len() as u64).min(remaining) as usize;
        if to_read == 0 {
            return Ok(0);
        }

        let transferred = match &mut file.backing {
            Backing::Memory(data) => {
                let start = file.position as usize;
                buf[..to_read].copy_from_slice(&data[start..start + to_read]);
                to_read
            }
            Backing::Archive { offset } => {
                let Some(archive) = self.archive.as_mut() else {
                    return Err(Error::Internal(
                        "archive-backed handle without archive".to_string(),
                    ));
                };
                archive.seek(SeekFrom::Start(*offset + file.position))?;
                archive.read(&mut buf[..to_read])?
            }
            Backing::Real(real) => real.read(&mut buf[..to_read])?,
        };

        file.position += transferred as u64;
        Ok(transferred)
    }

    fn seek(&mut self, handle: FileHandle, pos: SeekFrom) -> Result<u64> {
        let file = self
            .files
            .get_mut(handle.as_raw())
            .ok_or(Error::InvalidHandle(handle.as_raw()))?;

        let size = file.entry.decompressed_size;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => file.position as i128 + delta as i128,
            SeekFrom::End(delta) => size as i128 + delta as i128,
        };
        let clamped = target.clamp(0, size as i128) as u64;

        // Real-backed handles read at their OS cursor, which must follow
        // the logical position.
        if let Backing::Real(real) = &mut file.backing {
            real.seek(SeekFrom::Start(clamped))?;
        }

        file.position = clamped;
        Ok(clamped)
    }

    fn find_first(&mut self, pattern: &str) -> Result<(FindHandle, FindData)> {
        match find::open_cursor(&self.base_dir, &self.index, pattern) {
            Some((cursor, first)) => {
                let raw = self.cursors.insert(cursor);
                Ok((FindHandle::from_raw(raw), first))
            }
            None => Err(Error::NotFound),
        }
    }

    fn extract_file(&mut self, key: &str, dest: &Utf8Path) -> Result<()> {
        let Some(entry) = self.index.get(key) else {
            return Err(Error::NotFound);
        };
        let entry = entry.clone();

        let data = match &entry.source {
            EntrySource::Loose { path } => std::fs::read(path.as_std_path())?,
            EntrySource::Archive { offset } => {
                let Some(archive) = self.archive.as_mut() else {
                    return Err(Error::Internal(
                        "archive-backed entry without archive".to_string(),
                    ));
                };
                let stored = strategy::read_stored(archive, *offset, entry.stored_size)?;
                if entry.is_compressed() {
                    vpak::codec::decompress(&stored, entry.decompressed_size as usize)?
                } else {
                    stored
                }
            }
        };

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }
        std::fs::write(dest.as_std_path(), data)?;
        tracing::debug!("Extracted '{}' to {}", entry.relative_path, dest);
        Ok(())
    }

    fn teardown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let leaked_files = self.files.drain().len();
        let leaked_cursors = self.cursors.drain().len();
        if leaked_files > 0 || leaked_cursors > 0 {
            tracing::warn!(
                "Shutdown released {} open files and {} open cursors",
                leaked_files,
                leaked_cursors
            );
        }

        self.archive = None;
        self.index = FileIndex::default();
        self.strategy.cleanup();
        tracing::info!("Overlay shut down");
    }
}
