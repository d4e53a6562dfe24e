use miette::Diagnostic;
use pkgdb_utils::error::{FileSystemError, PathError, UtilsError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(pkgdb_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(pkgdb_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists: {0}")]
    #[diagnostic(
        code(pkgdb_config::already_exists),
        help("Remove the existing config file or point PKGDB_CONFIG elsewhere")
    )]
    ConfigAlreadyExists(String),

    #[error("Invalid artifact type name: {0}")]
    #[diagnostic(
        code(pkgdb_config::artifact_type),
        help("Type names start with a letter and contain only letters, digits, '.', '_' or '-'")
    )]
    InvalidArtifactType(String),

    #[error("Duplicate artifact type: {0}")]
    #[diagnostic(
        code(pkgdb_config::duplicate_artifact_type),
        help("Each artifact type must be declared once")
    )]
    DuplicateArtifactType(String),

    #[error("Invalid duration '{value}' for {field}")]
    #[diagnostic(
        code(pkgdb_config::duration),
        help("Use a duration such as \"12h\", \"7d\" or \"1d12h\"")
    )]
    InvalidDuration { field: &'static str, value: String },

    #[error("Savor context name cannot be empty")]
    #[diagnostic(code(pkgdb_config::savor_context))]
    EmptySavorContext,

    #[error("IO error: {0}")]
    #[diagnostic(code(pkgdb_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(pkgdb_config::utils))]
    Utils(#[from] UtilsError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(pkgdb_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(pkgdb_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
