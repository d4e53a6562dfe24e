use miette::Diagnostic;
use pkgdb_config::error::ConfigError;
use pkgdb_core::error::{ArtifactError, DatabaseError};
use pkgdb_utils::error::{FileSystemError, LockError, PathError, UtilsError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(pkgdb::utils))]
    Utils(#[from] UtilsError),

    #[error("Package not found: {0}")]
    #[diagnostic(
        code(pkgdb::not_found),
        help("Use `pkgdb list` to see known packages, or `--ghost` to include ghosts")
    )]
    NotFound(String),

    #[error("Feed not found: {0}")]
    #[diagnostic(code(pkgdb::feed_not_found), help("Use `pkgdb feeds` to see known feeds"))]
    FeedNotFound(String),

    #[error("{0}")]
    #[diagnostic(code(pkgdb::custom))]
    Custom(String),
}

impl From<ArtifactError> for CliError {
    fn from(err: ArtifactError) -> Self {
        Self::Database(DatabaseError::Artifact(err))
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for CliError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

impl From<LockError> for CliError {
    fn from(err: LockError) -> Self {
        Self::Utils(UtilsError::Lock(err))
    }
}

pub type CliResult<T> = std::result::Result<T, CliError>;
