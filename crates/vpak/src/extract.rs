//! Bulk extraction of archive entries to disk.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::{Read, Seek};

use crate::codec;
use crate::error::Result;
use crate::{Vpak, VpakEntry};

/// Writes the contents of a mounted archive out as loose files.
pub struct VpakExtractor<'a, TSource: Read + Seek> {
    vpak: &'a mut Vpak<TSource>,
}

impl<'a, TSource: Read + Seek> VpakExtractor<'a, TSource> {
    pub fn new(vpak: &'a mut Vpak<TSource>) -> Self {
        Self { vpak }
    }

    /// Extract every entry under `output_dir`, recreating the directory
    /// structure encoded in the entry paths. Returns the number of files
    /// written; entries whose path sanitizes to nothing are skipped.
    pub fn extract_all(&mut self, output_dir: impl AsRef<Utf8Path>) -> Result<usize> {
        let output_dir = output_dir.as_ref();
        let mut written = 0;

        for index in 0..self.vpak.entries().len() {
            let entry = self.vpak.entries()[index].clone();
            if self.extract_entry(&entry, output_dir)? {
                written += 1;
            }
        }

        Ok(written)
    }

    /// Extract a single entry. Returns `false` when the entry path cannot be
    /// mapped to a destination inside `output_dir`.
    pub fn extract_entry(&mut self, entry: &VpakEntry, output_dir: &Utf8Path) -> Result<bool> {
        let relative = relative_dest(&entry.path);
        if relative.as_str().is_empty() {
            tracing::warn!("Skipping entry with unusable path: '{}'", entry.path);
            return Ok(false);
        }

        let dest = output_dir.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = self.load_tolerant(entry)?;
        fs::write(&dest, data)?;

        Ok(true)
    }

    /// Load entry data, falling back to the stored bytes when a compressed
    /// payload does not decode. Damaged archives still yield whatever was
    /// on disk that way instead of aborting the whole extraction.
    fn load_tolerant(&mut self, entry: &VpakEntry) -> Result<Vec<u8>> {
        let stored = self.vpak.load_entry_raw(entry)?;
        if !entry.is_compressed() {
            return Ok(stored);
        }

        match codec::decompress(&stored, entry.decompressed_size as usize) {
            Ok(data) => Ok(data),
            Err(error) => {
                tracing::warn!(
                    "Failed to decompress '{}', writing stored bytes instead: {}",
                    entry.path,
                    error
                );
                Ok(stored)
            }
        }
    }
}

/// Map an archive path to a relative destination, dropping empty, `.` and
/// `..` components. Archives written by other tools use `\` separators.
fn relative_dest(path: &str) -> Utf8PathBuf {
    let mut dest = Utf8PathBuf::new();
    for component in path.split(['/', '\\']) {
        match component {
            "" | "." | ".." => continue,
            component => dest.push(component),
        }
    }
    dest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VpakBuilder;
    use byteorder::{WriteBytesExt, LE};
    use std::io::{Cursor, Write};

    #[test]
    fn test_extract_all_recreates_tree() {
        let mut out = Cursor::new(Vec::new());
        VpakBuilder::default()
            .with_entry("data/nested/config.bin")
            .with_entry("textures\\ui\\panel.dds")
            .with_entry("readme.txt")
            .build_to_writer(&mut out, |path, cursor| {
                cursor.write_all(path.as_bytes())?;
                Ok(())
            })
            .unwrap();

        let mut vpak = Vpak::mount_from_reader(Cursor::new(out.into_inner())).unwrap();
        let output = tempfile::tempdir().unwrap();
        let output_dir = Utf8Path::from_path(output.path()).unwrap();

        let written = VpakExtractor::new(&mut vpak).extract_all(output_dir).unwrap();

        assert_eq!(written, 3);
        assert_eq!(
            fs::read(output_dir.join("data/nested/config.bin")).unwrap(),
            b"data/nested/config.bin"
        );
        assert_eq!(
            fs::read(output_dir.join("textures/ui/panel.dds")).unwrap(),
            b"textures\\ui\\panel.dds"
        );
        assert_eq!(fs::read(output_dir.join("readme.txt")).unwrap(), b"readme.txt");
    }

    #[test]
    fn test_corrupt_payload_extracts_stored_bytes() {
        // Directory claims a compressed entry but the payload is garbage.
        let garbage = [0xAAu8; 10];
        let mut raw = Vec::new();
        raw.write_i32::<LE>(1).unwrap();
        raw.write_i32::<LE>(7).unwrap();
        raw.write_all(b"bad.bin").unwrap();
        raw.write_i32::<LE>(100).unwrap();
        raw.write_i32::<LE>(10).unwrap();
        raw.write_all(&garbage).unwrap();

        let mut vpak = Vpak::mount_from_reader(Cursor::new(raw)).unwrap();
        let output = tempfile::tempdir().unwrap();
        let output_dir = Utf8Path::from_path(output.path()).unwrap();

        let written = VpakExtractor::new(&mut vpak).extract_all(output_dir).unwrap();

        assert_eq!(written, 1);
        assert_eq!(fs::read(output_dir.join("bad.bin")).unwrap(), garbage);
    }

    #[test]
    fn test_traversal_components_are_dropped() {
        assert_eq!(relative_dest("..\\..\\boot.ini"), Utf8PathBuf::from("boot.ini"));
        assert_eq!(relative_dest("./data//file.bin"), Utf8PathBuf::from("data/file.bin"));
        assert_eq!(relative_dest("..").as_str(), "");
    }

    #[test]
    fn test_unusable_path_is_skipped() {
        let mut out = Cursor::new(Vec::new());
        VpakBuilder::default()
            .with_entry("..")
            .with_entry("kept.bin")
            .build_to_writer(&mut out, |_, cursor| {
                cursor.write_all(b"x")?;
                Ok(())
            })
            .unwrap();

        let mut vpak = Vpak::mount_from_reader(Cursor::new(out.into_inner())).unwrap();
        let output = tempfile::tempdir().unwrap();
        let output_dir = Utf8Path::from_path(output.path()).unwrap();

        let written = VpakExtractor::new(&mut vpak).extract_all(output_dir).unwrap();

        assert_eq!(written, 1);
        assert!(output_dir.join("kept.bin").exists());
    }
}
