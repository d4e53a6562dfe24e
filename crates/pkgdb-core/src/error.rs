//! Error types for pkgdb-core.

use miette::Diagnostic;
use pkgdb_utils::error::FileSystemError;
use thiserror::Error;

/// Errors raised while naming or registering artifacts.
#[derive(Error, Diagnostic, Debug)]
pub enum ArtifactError {
    #[error("Invalid artifact type name '{0}'")]
    #[diagnostic(
        code(pkgdb::artifact::type_name),
        help("Type names start with a letter and contain only letters, digits, '.', '_' or '-'")
    )]
    InvalidTypeName(String),

    #[error("Artifact type '{name}' is already registered with installable = {registered}")]
    #[diagnostic(
        code(pkgdb::artifact::type_conflict),
        help("A type keeps the installable flag it was first registered with")
    )]
    TypeConflict { name: String, registered: bool },

    #[error("Unknown artifact type '{0}'")]
    #[diagnostic(
        code(pkgdb::artifact::unknown_type),
        help("Register the type (see `artifact_types` in the configuration) before using it")
    )]
    UnknownType(String),

    #[error("Invalid artifact name '{0}'")]
    #[diagnostic(
        code(pkgdb::artifact::name),
        help("Artifact names are non-empty and cannot contain ':', '/' or whitespace")
    )]
    InvalidName(String),

    #[error("Invalid typed name '{0}'")]
    #[diagnostic(code(pkgdb::artifact::typed_name), help("Use the form Type:Name"))]
    InvalidTypedName(String),

    #[error("Invalid artifact instance '{0}'")]
    #[diagnostic(
        code(pkgdb::artifact::instance),
        help("Use the form Type:Name/Version (e.g. 'NuGet:Foo/1.0.0')")
    )]
    InvalidInstance(String),

    #[error("Invalid version '{input}': {source}")]
    #[diagnostic(code(pkgdb::artifact::version), help("Versions follow semantic versioning"))]
    InvalidVersion {
        input: String,
        #[source]
        source: semver::Error,
    },

    #[error("Invalid savor context '{0}'")]
    #[diagnostic(
        code(pkgdb::savors::context),
        help("Context names are non-empty and the separator cannot be whitespace")
    )]
    InvalidSavorContext(String),
}

/// Errors raised while reading or writing the binary snapshot format.
#[derive(Error, Diagnostic, Debug)]
pub enum FormatError {
    #[error("Snapshot stream ended unexpectedly")]
    #[diagnostic(
        code(pkgdb::format::eof),
        help("The snapshot file appears to be truncated")
    )]
    UnexpectedEof,

    #[error(transparent)]
    #[diagnostic(code(pkgdb::format::io))]
    Io(std::io::Error),

    #[error("Unsupported snapshot format version {found} (supported up to {supported})")]
    #[diagnostic(
        code(pkgdb::format::version),
        help("The snapshot was written by a newer release")
    )]
    UnsupportedVersion { found: u64, supported: u64 },

    #[error("Variable-length integer is too large")]
    #[diagnostic(code(pkgdb::format::varint))]
    VarintOverflow,

    #[error("String is not valid UTF-8")]
    #[diagnostic(code(pkgdb::format::utf8))]
    InvalidUtf8,

    #[error("Invalid {kind} pool reference {index}")]
    #[diagnostic(code(pkgdb::format::pool))]
    InvalidPoolIndex { kind: &'static str, index: u64 },

    #[error("Invalid instance marker {marker} at position {position}")]
    #[diagnostic(code(pkgdb::format::marker))]
    InvalidMarker { marker: u8, position: usize },

    #[error("Invalid {kind} value {value}")]
    #[diagnostic(code(pkgdb::format::enum_value))]
    InvalidEnum { kind: &'static str, value: u8 },

    #[error("Instance index {index} is out of range (count {len})")]
    #[diagnostic(code(pkgdb::format::index))]
    InvalidInstanceIndex { index: u64, len: usize },

    #[error("Instances are not strictly ordered at position {0}")]
    #[diagnostic(code(pkgdb::format::order))]
    UnsortedInstances(usize),

    #[error("Encoded savors are empty")]
    #[diagnostic(code(pkgdb::format::savors))]
    EmptySavors,

    #[error("Dependency target '{0}' is not part of the snapshot")]
    #[diagnostic(code(pkgdb::format::dangling))]
    DanglingReference(String),

    #[error("Feed '{0}' appears more than once")]
    #[diagnostic(code(pkgdb::format::duplicate_feed))]
    DuplicateFeed(String),

    #[error("Feed '{feed}' lists '{member}' of another artifact type")]
    #[diagnostic(code(pkgdb::format::feed_type))]
    FeedTypeMismatch { feed: String, member: String },

    #[error("Timestamp {seconds}s {nanos}ns is out of range")]
    #[diagnostic(code(pkgdb::format::timestamp))]
    InvalidTimestamp { seconds: i64, nanos: u64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Artifact(#[from] ArtifactError),
}

impl From<std::io::Error> for FormatError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            FormatError::UnexpectedEof
        } else {
            FormatError::Io(err)
        }
    }
}

/// Core error type for package database operations.
#[derive(Error, Diagnostic, Debug)]
pub enum DatabaseError {
    #[error("Feed '{feed}' declared by '{package}' does not match the package type")]
    #[diagnostic(
        code(pkgdb::add::feed_type),
        help("A package can only be published on feeds of its own artifact type")
    )]
    FeedTypeMismatch { package: String, feed: String },

    #[error("Invalid feed name '{feed}' declared by '{package}'")]
    #[diagnostic(code(pkgdb::add::feed_name), help("Feed names use the form Type:Name"))]
    InvalidFeedName { package: String, feed: String },

    #[error("Unresolved dependencies: {}", missing.join(", "))]
    #[diagnostic(
        code(pkgdb::add::unresolved),
        help("Add the missing packages in the same batch or before the packages that depend on them")
    )]
    UnresolvedDependencies { missing: Vec<String> },

    #[error("Dependency cycle: {}", cycle.join(" -> "))]
    #[diagnostic(
        code(pkgdb::add::cycle),
        help("A redefined package cannot depend on packages that depend on it")
    )]
    DependencyCycle { cycle: Vec<String> },

    #[error("Dependency '{target}' of '{package}' applies to savors '{savors}' the package does not have")]
    #[diagnostic(
        code(pkgdb::add::applicable_savors),
        help("Applicable savors must share at least one savor with the package")
    )]
    InvalidApplicableSavors {
        package: String,
        target: String,
        savors: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    #[diagnostic(code(pkgdb::fs))]
    FileSystem(#[from] FileSystemError),

    #[error("Error while {action}")]
    #[diagnostic(code(pkgdb::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid package record '{key}': {reason}")]
    #[diagnostic(code(pkgdb::record))]
    InvalidRecord { key: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(pkgdb::json),
        help("Package batches are JSON arrays of package records")
    )]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, DatabaseError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, DatabaseError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            DatabaseError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_dependencies_display() {
        let err = DatabaseError::UnresolvedDependencies {
            missing: vec!["NuGet:Bar/2.0.0".into(), "NuGet:Baz/1.0.0".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unresolved dependencies: NuGet:Bar/2.0.0, NuGet:Baz/1.0.0"
        );
    }

    #[test]
    fn test_dependency_cycle_display() {
        let err = DatabaseError::DependencyCycle {
            cycle: vec!["NuGet:A/1.0.0".into(), "NuGet:B/1.0.0".into(), "NuGet:A/1.0.0".into()],
        };
        assert_eq!(
            err.to_string(),
            "Dependency cycle: NuGet:A/1.0.0 -> NuGet:B/1.0.0 -> NuGet:A/1.0.0"
        );
    }

    #[test]
    fn test_eof_io_error_maps_to_unexpected_eof() {
        let err: FormatError = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(err, FormatError::UnexpectedEof));

        let err: FormatError = std::io::Error::other("disk").into();
        assert!(matches!(err, FormatError::Io(_)));
    }

    #[test]
    fn test_with_context() {
        let result: std::io::Result<()> = Err(std::io::Error::other("denied"));
        let err = result
            .with_context(|| "reading batch file".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "Error while reading batch file");
    }
}
