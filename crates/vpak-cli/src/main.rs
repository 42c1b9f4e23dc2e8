use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    info_archive, pack_directory, unpack_archive, InfoArchiveArgs, PackDirectoryArgs,
    UnpackArchiveArgs,
};
use miette::Result;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pack a directory into a vpak archive
    Pack {
        /// The directory whose files should be packed
        #[arg(short, long)]
        input_dir: String,

        /// The path of the resulting archive file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Extract a vpak archive to a directory
    Unpack {
        /// The path to the archive file
        #[arg(short, long)]
        file_path: String,

        /// The directory to extract the archive to
        #[arg(short, long)]
        output_dir: Option<String>,
    },
    /// Show information about a vpak archive
    Info {
        /// The path to the archive file
        #[arg(short, long)]
        file_path: String,
    },
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).expect("failed to parse arguments")
}

fn main() -> Result<()> {
    let args = parse_args();

    match args.command {
        Commands::Pack { input_dir, output } => {
            pack_directory(PackDirectoryArgs { input_dir, output })
        }
        Commands::Unpack {
            file_path,
            output_dir,
        } => unpack_archive(UnpackArchiveArgs {
            file_path,
            output_dir,
        }),
        Commands::Info { file_path } => info_archive(InfoArchiveArgs { file_path }),
    }
}
