use std::fs::File;

use colored::Colorize;
use miette::IntoDiagnostic;
use vpak::Vpak;

use crate::println_pad;

pub struct InfoArchiveArgs {
    pub file_path: String,
}

pub fn info_archive(args: InfoArchiveArgs) -> miette::Result<()> {
    let file = File::open(&args.file_path).into_diagnostic()?;
    let vpak = Vpak::mount_lenient(file).into_diagnostic()?;

    println_pad!(
        "{} {}",
        "📦 Archive:".bright_blue().bold(),
        args.file_path.bright_cyan().bold()
    );
    println_pad!(
        "{} {}",
        "🗂 Entries:".bright_green(),
        vpak.entries().len().to_string().bright_white().bold()
    );

    println_pad!("\n{}", "📄 Files:".bright_magenta().bold());
    let mut stored_total = 0u64;
    let mut decompressed_total = 0u64;
    for entry in vpak.entries() {
        stored_total += entry.stored_size as u64;
        decompressed_total += entry.decompressed_size as u64;

        let codec = if entry.is_compressed() { "zstd" } else { "raw" };
        println_pad!(
            "   {} {} {} {}",
            "•".bright_cyan(),
            entry.path.bright_cyan().bold(),
            format!("({} -> {} bytes)", entry.stored_size, entry.decompressed_size).dimmed(),
            codec.bright_white()
        );
    }

    println_pad!(
        "\n{} {} {} {}",
        "💾 Total:".bright_green(),
        format!("{} bytes stored,", stored_total).bright_white().bold(),
        decompressed_total.to_string().bright_white().bold(),
        "bytes unpacked".bright_white()
    );

    Ok(())
}
