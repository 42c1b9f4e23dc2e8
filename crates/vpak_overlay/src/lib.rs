//! Read-only virtual filesystem overlay for [vpak](vpak) archives.
//!
//! This crate serves a host process a merged view of two content sources:
//! a packed archive and a directory of loose override files. It supports:
//!
//! - **Shadowing**: a loose file silently overrides the archive entry at
//!   the same normalized path
//! - **Opaque handles**: open/read/seek/size/close with OS-like semantics,
//!   including seek clamping and zero-byte reads at end of file
//! - **Merged enumeration**: directory listings that combine real results
//!   with virtual entries, each filename emitted exactly once
//! - **Transparent decompression**: compressed entries are served whole at
//!   their logical size
//!
//! The caller sits between the host's file API and this crate: it decides
//! which calls to redirect here and falls back to the real filesystem
//! whenever the overlay answers "not ours".
//!
//! # Example
//!
//! ```no_run
//! use vpak_overlay::{Overlay, OverlayConfig};
//!
//! # fn main() -> vpak_overlay::Result<()> {
//! let overlay = Overlay::mount("/game", &OverlayConfig::default())?;
//! if overlay.is_active() {
//!     if let Some(handle) = overlay.open("data/strings.bin")? {
//!         let mut buf = vec![0u8; overlay.size(handle)? as usize];
//!         overlay.read(handle, &mut buf)?;
//!         overlay.close(handle)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod find;
pub mod index;
pub mod overlay;
pub mod path;
pub mod strategy;
pub mod table;

// Re-export main types
pub use config::{OpenMode, OverlayConfig};
pub use error::{Error, Result};
pub use find::FindData;
pub use overlay::{FileHandle, FileInfo, FileKind, FindHandle, Overlay};
