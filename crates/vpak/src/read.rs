use byteorder::{ReadBytesExt, LE};
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::{Result, VpakError};
use crate::{Vpak, VpakEntry, MAX_PATH_LEN};

impl<TSource: Read + Seek> Vpak<TSource> {
    /// Mount an archive by reading its directory records.
    ///
    /// The record count must be readable and plausible; a malformed record
    /// further in stops directory reading at that record, keeping the
    /// records already read, since everything after an undecodable record
    /// boundary is unrecoverable anyway. Payload bytes are not touched here.
    pub fn mount_from_reader(mut source: TSource) -> Result<Self> {
        let entries = read_directory(&mut source, |reader| read_record(reader))?;
        Ok(Self { entries, source })
    }

    /// Mount an archive, also accepting directory records written by the
    /// original single-size format (no decompressed-size field).
    ///
    /// Detection is per record: if the two size fields cannot belong to the
    /// current format (negative, or stored larger than decompressed), the
    /// second field was actually the start of the payload, so it is unread
    /// and the record reparsed as `path, size, raw payload`. A payload whose
    /// first four bytes happen to form a plausible size pair can defeat the
    /// heuristic, so only offline tooling should mount this way.
    pub fn mount_lenient(mut source: TSource) -> Result<Self> {
        let entries = read_directory(&mut source, |reader| read_record_lenient(reader))?;
        Ok(Self { entries, source })
    }
}

fn read_directory<TSource>(
    source: &mut TSource,
    read_one: fn(&mut BufReader<&mut TSource>) -> Result<VpakEntry>,
) -> Result<Vec<VpakEntry>>
where
    TSource: Read + Seek,
{
    let mut reader = BufReader::new(source);

    let count = reader.read_i32::<LE>()?;
    if count < 0 {
        return Err(VpakError::InvalidEntryCount(count));
    }

    let mut entries = Vec::with_capacity(count.min(1024) as usize);
    for record in 0..count {
        match read_one(&mut reader) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(
                    "Archive directory unreadable at record {} of {}, keeping {} entries: {}",
                    record,
                    count,
                    entries.len(),
                    err
                );
                break;
            }
        }
    }

    Ok(entries)
}

fn read_path<R: Read>(reader: &mut R) -> Result<String> {
    let path_len = reader.read_i32::<LE>()?;
    if path_len < 0 || path_len as usize > MAX_PATH_LEN {
        return Err(VpakError::InvalidRecord(format!(
            "path length {path_len} out of range"
        )));
    }

    let mut raw = vec![0u8; path_len as usize];
    reader.read_exact(&mut raw)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn read_record<R: Read + Seek>(reader: &mut R) -> Result<VpakEntry> {
    let path = read_path(reader)?;

    let decompressed_size = reader.read_i32::<LE>()?;
    let stored_size = reader.read_i32::<LE>()?;
    if decompressed_size < 0 || stored_size < 0 || stored_size > decompressed_size {
        return Err(VpakError::InvalidRecord(format!(
            "'{path}': stored size {stored_size} vs decompressed size {decompressed_size}"
        )));
    }

    finish_record(reader, path, decompressed_size, stored_size)
}

fn read_record_lenient<R: Read + Seek>(reader: &mut R) -> Result<VpakEntry> {
    let path = read_path(reader)?;

    let first = reader.read_i32::<LE>()?;
    let second = reader.read_i32::<LE>()?;

    let (decompressed_size, stored_size) = if second < 0 || second > first {
        // Old records stored the payload right after a single size field,
        // so the second read pulled payload bytes; give them back.
        reader.seek(SeekFrom::Current(-4))?;
        if first < 0 {
            return Err(VpakError::InvalidRecord(format!(
                "'{path}': size {first} out of range"
            )));
        }
        (first, first)
    } else {
        (first, second)
    };

    finish_record(reader, path, decompressed_size, stored_size)
}

fn finish_record<R: Read + Seek>(
    reader: &mut R,
    path: String,
    decompressed_size: i32,
    stored_size: i32,
) -> Result<VpakEntry> {
    let offset = reader.stream_position()?;
    reader.seek(SeekFrom::Current(i64::from(stored_size)))?;

    Ok(VpakEntry {
        path,
        decompressed_size: decompressed_size as u32,
        stored_size: stored_size as u32,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VpakBuilder;
    use byteorder::WriteBytesExt;
    use std::io::{Cursor, Write};

    fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = VpakBuilder::default();
        for (path, _) in entries {
            builder = builder.with_entry(*path);
        }

        let mut out = Cursor::new(Vec::new());
        builder
            .build_to_writer(&mut out, |path, cursor| {
                let (_, data) = entries
                    .iter()
                    .find(|(p, _)| *p == path)
                    .expect("unknown entry path");
                cursor.write_all(data)?;
                Ok(())
            })
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_mount_and_load() {
        let big = b"repetition compresses well ".repeat(100);
        let bytes = build_archive(&[("data/strings.bin", &big), ("tiny.txt", b"hi")]);

        let mut vpak = Vpak::mount_from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(vpak.entries().len(), 2);

        let strings = vpak.entries()[0].clone();
        assert_eq!(strings.path, "data/strings.bin");
        assert_eq!(strings.decompressed_size as usize, big.len());
        assert!(strings.is_compressed());
        assert_eq!(vpak.load_entry_data(&strings).unwrap(), big);

        let tiny = vpak.entries()[1].clone();
        assert_eq!(tiny.stored_size, tiny.decompressed_size);
        assert!(!tiny.is_compressed());
        assert_eq!(vpak.load_entry_data(&tiny).unwrap(), b"hi");
    }

    #[test]
    fn test_load_entry_raw_keeps_stored_bytes() {
        let big = b"0123456789".repeat(50);
        let bytes = build_archive(&[("a.bin", &big)]);

        let mut vpak = Vpak::mount_from_reader(Cursor::new(bytes)).unwrap();
        let entry = vpak.entries()[0].clone();
        let raw = vpak.load_entry_raw(&entry).unwrap();
        assert_eq!(raw.len(), entry.stored_size as usize);
        assert_ne!(raw, big);
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let mut bytes = Vec::new();
        bytes.write_i32::<LE>(-5).unwrap();

        let err = Vpak::mount_from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, VpakError::InvalidEntryCount(-5)));
    }

    #[test]
    fn test_empty_stream_is_rejected() {
        assert!(Vpak::mount_from_reader(Cursor::new(Vec::new())).is_err());
    }

    #[test]
    fn test_truncated_directory_keeps_leading_records() {
        let bytes = build_archive(&[("first.txt", b"first payload"), ("second.txt", b"second")]);

        // Cut the stream in the middle of the second record's header.
        let first_record_end = 4 + 4 + "first.txt".len() + 4 + 4 + "first payload".len();
        let truncated = bytes[..first_record_end + 6].to_vec();

        let mut vpak = Vpak::mount_from_reader(Cursor::new(truncated)).unwrap();
        assert_eq!(vpak.entries().len(), 1);
        let entry = vpak.entries()[0].clone();
        assert_eq!(entry.path, "first.txt");
        assert_eq!(vpak.load_entry_data(&entry).unwrap(), b"first payload");
    }

    #[test]
    fn test_inverted_sizes_stop_strict_mount() {
        let mut bytes = Vec::new();
        bytes.write_i32::<LE>(1).unwrap();
        bytes.write_i32::<LE>(5).unwrap();
        bytes.write_all(b"a.bin").unwrap();
        bytes.write_i32::<LE>(10).unwrap(); // decompressed
        bytes.write_i32::<LE>(90).unwrap(); // stored > decompressed
        bytes.write_all(&[0u8; 90]).unwrap();

        let vpak = Vpak::mount_from_reader(Cursor::new(bytes)).unwrap();
        assert!(vpak.entries().is_empty());
    }

    fn build_legacy_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.write_i32::<LE>(entries.len() as i32).unwrap();
        for (path, data) in entries {
            bytes.write_i32::<LE>(path.len() as i32).unwrap();
            bytes.write_all(path.as_bytes()).unwrap();
            bytes.write_i32::<LE>(data.len() as i32).unwrap();
            bytes.write_all(data).unwrap();
        }
        bytes
    }

    #[test]
    fn test_lenient_mount_reads_single_size_records() {
        // 0xFF leading payload bytes make the misread "stored size" negative,
        // which is what trips the old-format detection.
        let payload_a = [0xFFu8; 32];
        let payload_b = [0xFEu8; 7];
        let bytes = build_legacy_archive(&[("old/a.dat", &payload_a), ("old/b.dat", &payload_b)]);

        let mut vpak = Vpak::mount_lenient(Cursor::new(bytes)).unwrap();
        assert_eq!(vpak.entries().len(), 2);

        let entries = vpak.entries().to_vec();
        for (entry, expected) in entries.iter().zip([&payload_a[..], &payload_b[..]]) {
            assert_eq!(entry.stored_size, entry.decompressed_size);
            assert_eq!(vpak.load_entry_data(entry).unwrap(), expected);
        }
    }

    #[test]
    fn test_lenient_mount_reads_current_records() {
        let big = b"current format data ".repeat(64);
        let bytes = build_archive(&[("cur.bin", &big)]);

        let mut lenient = Vpak::mount_lenient(Cursor::new(bytes.clone())).unwrap();
        let strict = Vpak::mount_from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(lenient.entries(), strict.entries());

        let entry = lenient.entries()[0].clone();
        assert_eq!(lenient.load_entry_data(&entry).unwrap(), big);
    }

    #[test]
    fn test_strict_mount_rejects_single_size_records() {
        let payload = [0xFFu8; 16];
        let bytes = build_legacy_archive(&[("old.dat", &payload)]);

        let vpak = Vpak::mount_from_reader(Cursor::new(bytes)).unwrap();
        assert!(vpak.entries().is_empty());
    }
}
