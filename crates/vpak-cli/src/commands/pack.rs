use std::{
    fs::File,
    io::{BufWriter, Write},
};

use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use vpak::VpakBuilder;
use vpak_overlay::OverlayConfig;
use walkdir::WalkDir;

use crate::errors::CliError;
use crate::utils::parent_or_cwd;

#[derive(Debug)]
pub struct PackDirectoryArgs {
    pub input_dir: String,
    pub output: Option<String>,
}

pub fn pack_directory(args: PackDirectoryArgs) -> Result<()> {
    let input_dir = Utf8PathBuf::from(&args.input_dir);
    if !input_dir.is_dir() {
        return Err(CliError::input_dir_not_found(input_dir).into());
    }

    let files = collect_files(&input_dir)?;

    println!(
        "{} {}",
        "📦 Packing directory:".bright_blue().bold(),
        input_dir.as_str().bright_cyan().bold()
    );

    let output_path = match args.output {
        Some(output) => Utf8PathBuf::from(output),
        None => default_output_path(&input_dir),
    };
    if let Some(parent) = output_path.parent() {
        if !parent.as_str().is_empty() && !parent.exists() {
            println!(
                "{} {}",
                "📁 Creating output directory:".bright_yellow(),
                parent.as_str().bright_white().bold()
            );
            std::fs::create_dir_all(parent.as_std_path()).map_err(CliError::from)?;
        }
    }

    let mut builder = VpakBuilder::default();
    for relative in &files {
        builder = builder.with_entry(relative.as_str());
    }

    let mut writer =
        BufWriter::new(File::create(output_path.as_std_path()).map_err(CliError::from)?);
    builder
        .build_to_writer(&mut writer, |path, cursor| {
            // Unreadable files become empty entries so one bad file does
            // not sink the whole archive.
            match std::fs::read(input_dir.join(path).as_std_path()) {
                Ok(data) => cursor.write_all(&data)?,
                Err(error) => {
                    println!(
                        "{} {}: {}",
                        "⚠️ Storing empty entry for unreadable file".bright_yellow(),
                        path.bright_white(),
                        error
                    );
                }
            }
            Ok(())
        })
        .into_diagnostic()?;

    println!(
        "{}\n{} {} {}\n{} {}",
        "✅ Archive created successfully!".bright_green().bold(),
        "🗂 Entries:".bright_green(),
        files.len().to_string().bright_white().bold(),
        if files.len() == 1 { "file" } else { "files" },
        "📍 Path:".bright_green(),
        output_path.as_str().bright_white().bold()
    );

    Ok(())
}

/// Walk the input directory and return every file as a sorted, forward-slash
/// path relative to it.
fn collect_files(input_dir: &Utf8Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir.as_std_path()) {
        let entry = entry.into_diagnostic()?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8PathBuf::from_path_buf(entry.into_path())
            .map_err(|path| miette::miette!("Non-UTF-8 path: {}", path.display()))?;
        let relative = path.strip_prefix(input_dir).into_diagnostic()?;
        files.push(relative.as_str().replace('\\', "/"));
    }

    files.sort();
    Ok(files)
}

/// Default output: the archive name the overlay expects, next to the input
/// directory. An `overlay.json` beside the input directory can rename it.
fn default_output_path(input_dir: &Utf8Path) -> Utf8PathBuf {
    let parent = parent_or_cwd(input_dir);
    let config = OverlayConfig::load(&parent.join("overlay.json"))
        .ok()
        .flatten()
        .unwrap_or_default();
    parent.join(config.archive_name)
}
