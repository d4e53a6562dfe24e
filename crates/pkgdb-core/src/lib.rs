//! Immutable, versioned artifact package database.
//!
//! A [`PackageDatabase`] is a snapshot of known package instances, the feeds
//! publishing them and their dependency graph. [`PackageDatabase::add`] and
//! [`PackageDatabase::drop_feed`] never modify a snapshot: they return a new
//! one along with a [`ChangedInfo`] describing the transition.

pub mod artifact;
pub mod binary;
pub mod changed;
pub mod database;
pub mod error;
pub mod feed;
pub mod info;
pub mod instance;
pub mod savors;
pub mod shared;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use artifact::{Artifact, ArtifactInstance, ArtifactType, ArtifactTypeRegistry};
pub use changed::{ChangedInfo, FeedChangedInfo, PackageChangedInfo, PackageEventKind};
pub use database::{FeedVersions, PackageDatabase};
pub use error::{DatabaseError, Result};
pub use feed::PackageFeed;
pub use info::{FullPackageInfo, PackageInfo, PackageRecord};
pub use instance::{
    ArtifactDependencyKind, PackageInstance, PackageQuality, PackageState, Reference, SVersionLock,
};
pub use savors::{Savors, TraitContext};
pub use shared::SharedDatabase;
pub use store::InstanceStore;
