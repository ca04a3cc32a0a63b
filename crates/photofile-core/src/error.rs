use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a run. A file whose metadata cannot be read is not an
/// error: it is organized as undated. `Copy` is reported for a single file and
/// the run carries on.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Source folder not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Cannot create destination folder {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write logfile {path}: {source}")]
    ActionLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write copy script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {src} to {dest}: {source}")]
    Copy {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
