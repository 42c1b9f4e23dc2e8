//! Directory enumeration across real and virtual entries.
//!
//! A [`FindCursor`] merges two result streams for one search pattern:
//!
//! 1. **Real results**: whatever the operating system returns for the
//!    pattern's directory. These are served first and are never shadowed,
//!    but every emitted name is remembered.
//! 2. **Virtual matches**: indexed entries whose virtual location (their
//!    relative path rejoined onto the base directory) sits in the queried
//!    directory and whose filename matches the mask. These are emitted in
//!    name order after the real stream ends, skipping any name the real
//!    stream already produced.
//!
//! The net effect is a single merged listing in which no filename appears
//! twice, regardless of which side provided it. Name comparison is
//! case-insensitive throughout.

use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::fs::ReadDir;

use crate::index::FileIndex;
use crate::path::{normalize, split_pattern};

/// One enumeration result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindData {
    pub file_name: String,
    pub file_size: u64,
    pub read_only: bool,
}

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

/// Live enumeration state for one search pattern.
pub struct FindCursor {
    /// Real directory stream, dropped once exhausted.
    real: Option<ReadDir>,
    pattern: Pattern,
    /// Lowercased names already emitted.
    seen: HashSet<String>,
    virtual_matches: Vec<FindData>,
    next_virtual: usize,
}

/// Start an enumeration. Returns the cursor plus its first result, or
/// `None` when neither side has a match for the pattern.
pub fn open_cursor(
    base_dir: &Utf8Path,
    index: &FileIndex,
    pattern_text: &str,
) -> Option<(FindCursor, FindData)> {
    let (dir_part, mask) = split_pattern(pattern_text);
    let pattern = Pattern::new(&mask).ok()?;

    let search_dir = if dir_part.is_empty() {
        base_dir.to_path_buf()
    } else if Utf8Path::new(&dir_part).is_absolute() {
        Utf8PathBuf::from(&dir_part)
    } else {
        base_dir.join(&dir_part)
    };

    let mut cursor = FindCursor {
        real: std::fs::read_dir(search_dir.as_std_path()).ok(),
        pattern,
        seen: HashSet::new(),
        virtual_matches: Vec::new(),
        next_virtual: 0,
    };

    let first_real = cursor.next_real_match();
    cursor.collect_virtual(base_dir, index, &search_dir);

    let first = first_real.or_else(|| cursor.next_unseen_virtual())?;
    Some((cursor, first))
}

impl FindCursor {
    /// Emit the next merged result, or `None` when both streams are done.
    pub fn advance(&mut self) -> Option<FindData> {
        if let Some(found) = self.next_real_match() {
            return Some(found);
        }
        self.next_unseen_virtual()
    }

    /// Pull the real stream until a name matches the mask. Emitted names
    /// are recorded so virtual matches cannot repeat them.
    fn next_real_match(&mut self) -> Option<FindData> {
        loop {
            let entries = self.real.as_mut()?;
            let entry = match entries.next() {
                None => {
                    self.real = None;
                    return None;
                }
                Some(Err(error)) => {
                    tracing::warn!("Skipping unreadable directory entry: {}", error);
                    continue;
                }
                Some(Ok(entry)) => entry,
            };

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(name) => {
                    tracing::warn!("Skipping non-UTF-8 name: {}", name.to_string_lossy());
                    continue;
                }
            };
            if !self.pattern.matches_with(&name, match_options()) {
                continue;
            }

            let (file_size, read_only) = match entry.metadata() {
                Ok(metadata) => (metadata.len(), metadata.permissions().readonly()),
                Err(_) => (0, false),
            };

            self.seen.insert(name.to_lowercase());
            return Some(FindData {
                file_name: name,
                file_size,
                read_only,
            });
        }
    }

    /// Scan the index for entries that virtually live in `search_dir` and
    /// match the mask, collected in name order.
    fn collect_virtual(&mut self, base_dir: &Utf8Path, index: &FileIndex, search_dir: &Utf8Path) {
        let wanted_dir = normalize(search_dir.as_str());

        for (_, entry) in index.iter() {
            let virtual_path = base_dir.join(entry.relative_path.replace('\\', "/"));
            let Some(parent) = virtual_path.parent() else {
                continue;
            };
            if normalize(parent.as_str()) != wanted_dir {
                continue;
            }
            let Some(name) = virtual_path.file_name() else {
                continue;
            };
            if !self.pattern.matches_with(name, match_options()) {
                continue;
            }

            self.virtual_matches.push(FindData {
                file_name: name.to_string(),
                file_size: entry.decompressed_size,
                read_only: true,
            });
        }

        self.virtual_matches
            .sort_by(|a, b| a.file_name.to_lowercase().cmp(&b.file_name.to_lowercase()));
    }

    fn next_unseen_virtual(&mut self) -> Option<FindData> {
        while self.next_virtual < self.virtual_matches.len() {
            let data = self.virtual_matches[self.next_virtual].clone();
            self.next_virtual += 1;
            if self.seen.insert(data.file_name.to_lowercase()) {
                return Some(data);
            }
        }
        None
    }
}
