/// All diagnostics emitted by package database operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbEvent {
    /// A batch was rejected; nothing was published.
    AddRejected { reason: RejectReason },
    /// A known package was re-submitted with different content. The new content wins.
    ContentMismatch {
        package: String,
        stored: String,
        submitted: String,
    },
    /// A transaction produced a new snapshot.
    Committed {
        serial_number: u64,
        package_changes: usize,
        new_feeds: usize,
        updated_feeds: usize,
        dropped_feeds: usize,
    },
    /// Snapshot persistence stage.
    Snapshot {
        serial_number: u64,
        stage: SnapshotStage,
    },
    /// Generic log message.
    Log { level: LogLevel, message: String },
}

/// Why an `add` batch was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A declared feed's artifact type differs from the package type.
    FeedTypeMismatch { package: String, feed: String },
    /// A declared feed name is not a valid `Type:Name`.
    InvalidFeedName { package: String, feed: String },
    /// Dependency targets found neither earlier in the batch nor in the store.
    UnresolvedDependencies { missing: Vec<String> },
    /// A dependency applies to none of the package savors.
    InvalidApplicableSavors { package: String, target: String },
    /// Redefined packages close a dependency loop, first key repeated last.
    DependencyCycle { cycle: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStage {
    Loaded { instances: usize, feeds: usize },
    Saved { bytes: u64, compressed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}
