use std::fs::File;

use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use vpak::{Vpak, VpakExtractor};

use crate::errors::CliError;
use crate::println_pad;

pub struct UnpackArchiveArgs {
    pub file_path: String,
    pub output_dir: Option<String>,
}

/// Compute the default output directory: parent folder + file stem
fn default_output_dir(file_path: &Utf8Path) -> Utf8PathBuf {
    let file_stem = file_path.file_stem().unwrap_or("unpacked");
    match file_path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.join(file_stem),
        _ => Utf8PathBuf::from(file_stem),
    }
}

pub fn unpack_archive(args: UnpackArchiveArgs) -> Result<()> {
    let file_path = Utf8Path::new(&args.file_path);
    if !file_path.exists() {
        return Err(CliError::archive_not_found(file_path.to_path_buf()).into());
    }

    let file = File::open(file_path)
        .map_err(|e| miette::miette!("Failed to open '{}': {}", file_path, e))?;
    let mut vpak = Vpak::mount_lenient(file).into_diagnostic()?;

    println_pad!(
        "{} {}",
        "📦 Unpacking archive:".bright_blue().bold(),
        args.file_path.bright_cyan().bold()
    );

    let output_dir = args
        .output_dir
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| default_output_dir(file_path));

    println_pad!(
        "{} {}",
        "📁 Extracting to:".bright_yellow(),
        output_dir.as_str().bright_white().bold()
    );

    let mut extractor = VpakExtractor::new(&mut vpak);
    let written = extractor.extract_all(&output_dir).into_diagnostic()?;

    println_pad!(
        "{} {} {}",
        "✅ Extracted".bright_green().bold(),
        written.to_string().bright_white().bold(),
        if written == 1 { "file!" } else { "files!" }
    );

    Ok(())
}
