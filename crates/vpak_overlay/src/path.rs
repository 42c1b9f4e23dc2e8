//! Path normalization for overlay lookups.
//!
//! Both sides of the overlay are keyed by a normalized form so that
//! `Data/Strings.bin`, `data\strings.bin` and `\DATA\STRINGS.BIN` all name
//! the same virtual file.

use encoding_rs::Encoding;

/// Normalize a path into its lookup key: lowercase, backslash separators,
/// no leading separator.
pub fn normalize(path: &str) -> String {
    path.to_lowercase()
        .replace('/', "\\")
        .trim_start_matches('\\')
        .to_string()
}

/// Decode raw bytes with the given encoding, then normalize.
///
/// Callers on the legacy API hand over bytes in the process code page, not
/// UTF-8. Undecodable bytes become replacement characters, which simply
/// never match an indexed key.
pub fn normalize_encoded(raw: &[u8], encoding: &'static Encoding) -> String {
    let (decoded, _, _) = encoding.decode(raw);
    normalize(&decoded)
}

/// Split a search pattern into its directory part and its filename mask.
///
/// The mask `*.*` is a legacy spelling of "everything", including names
/// without a dot, and is rewritten to `*`.
pub fn split_pattern(pattern: &str) -> (String, String) {
    let (dir, mask) = match pattern.rfind(['/', '\\']) {
        Some(split_at) => (&pattern[..split_at], &pattern[split_at + 1..]),
        None => ("", pattern),
    };

    let mask = if mask == "*.*" { "*" } else { mask };
    (dir.to_string(), mask.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_case_and_separators() {
        assert_eq!(normalize("Data/Strings.bin"), "data\\strings.bin");
        assert_eq!(normalize("\\DATA\\STRINGS.BIN"), "data\\strings.bin");
        assert_eq!(normalize("data\\strings.bin"), "data\\strings.bin");
    }

    #[test]
    fn test_normalize_keeps_inner_separators() {
        assert_eq!(normalize("//a//b"), "a\\\\b");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_encoded_decodes_code_page() {
        let encoding = encoding_rs::WINDOWS_1252;
        assert_eq!(normalize_encoded(b"Caf\xE9.txt", encoding), "caf\u{e9}.txt");
        assert_eq!(normalize_encoded(b"plain.txt", encoding), "plain.txt");
    }

    #[test]
    fn test_split_pattern() {
        assert_eq!(
            split_pattern("data\\sounds\\*.wav"),
            ("data\\sounds".to_string(), "*.wav".to_string())
        );
        assert_eq!(split_pattern("*.txt"), (String::new(), "*.txt".to_string()));
        assert_eq!(
            split_pattern("data/*.*"),
            ("data".to_string(), "*".to_string())
        );
        assert_eq!(split_pattern("*.*"), (String::new(), "*".to_string()));
    }
}
