use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Input directory not found: {path}")]
    #[diagnostic(
        code(pack::input_dir_missing),
        help("Make sure the directory exists and the path is correct")
    )]
    InputDirNotFound { path: Utf8PathBuf },

    #[error("Archive not found: {path}")]
    #[diagnostic(
        code(archive::not_found),
        help("Make sure the archive file exists and the path is correct")
    )]
    ArchiveNotFound { path: Utf8PathBuf },

    #[error("IO operation failed")]
    #[diagnostic(code(io::operation_failed))]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn input_dir_not_found(path: Utf8PathBuf) -> Self {
        Self::InputDirNotFound { path }
    }

    pub fn archive_not_found(path: Utf8PathBuf) -> Self {
        Self::ArchiveNotFound { path }
    }
}
