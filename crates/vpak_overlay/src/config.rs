//! Overlay configuration persistence.
//!
//! The overlay reads an optional `overlay.json` next to the game content it
//! virtualizes. The file names the archive, the loose-file directory and the
//! open strategy; every field has a default, so a missing or partial file
//! still produces a working configuration.

use crate::error::Result;
use camino::Utf8Path;
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

/// Current configuration schema version.
pub const CONFIG_VERSION: u32 = 1;

/// How file handles are backed once a virtual file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpenMode {
    /// Serve reads straight from the archive, decompressing whole entries
    /// into memory on open.
    Direct,
    /// Extract entries into an on-disk cache on first open and serve reads
    /// from the cached file.
    Staged,
}

/// Overlay settings, persisted as `overlay.json`.
///
/// # JSON format
///
/// ```json
/// {
///   "version": 1,
///   "archiveName": "data.vpak",
///   "overlayDir": "patch",
///   "openMode": "direct",
///   "encoding": "windows-1252",
///   "cacheDir": "vpak_cache"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayConfig {
    /// Schema version (current: `1`).
    pub version: u32,

    /// Archive filename, looked up in the base directory first and the
    /// overlay directory second.
    pub archive_name: String,

    /// Directory of loose override files, relative to the base directory.
    pub overlay_dir: String,

    /// Strategy used to back opened files.
    pub open_mode: OpenMode,

    /// Label of the code page legacy callers pass raw path bytes in.
    /// Unknown labels fall back to `windows-1252`.
    pub encoding: String,

    /// Directory for staged extractions, relative to the base directory.
    /// Only used when `open_mode` is `staged`.
    pub cache_dir: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            archive_name: "data.vpak".to_string(),
            overlay_dir: "patch".to_string(),
            open_mode: OpenMode::Direct,
            encoding: "windows-1252".to_string(),
            cache_dir: "vpak_cache".to_string(),
        }
    }
}

impl OverlayConfig {
    /// Load configuration from a file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    /// Returns `Err` if the file exists but cannot be parsed.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path.as_std_path())?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(Some(config))
    }

    /// Save configuration to a file, creating parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_std_path(), contents)?;
        Ok(())
    }

    /// Resolve the configured encoding label.
    pub fn resolved_encoding(&self) -> &'static Encoding {
        Encoding::for_label(self.encoding.as_bytes()).unwrap_or(encoding_rs::WINDOWS_1252)
    }
}
