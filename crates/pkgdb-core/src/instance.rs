//! Immutable package nodes and their dependency edges.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{artifact::ArtifactInstance, error::FormatError, savors::Savors};

bitflags! {
    /// State flags of a package instance.
    ///
    /// Only [`PackageState::GHOST`] has a meaning for the database; any other
    /// bit is carried through untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PackageState: u8 {
        /// Present for referential completeness, not a resolved publication.
        const GHOST = 1;

        const _ = !0;
    }
}

macro_rules! byte_enum {
    (
        $(#[$meta:meta])*
        $name:ident as $kind:literal { $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+ }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize, Serialize)]
        #[repr(u8)]
        pub enum $name {
            #[default]
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl TryFrom<u8> for $name {
            type Error = FormatError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(FormatError::InvalidEnum {
                        kind: $kind,
                        value,
                    }),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }
    };
}

byte_enum! {
    /// How strictly a dependency pins the target version.
    SVersionLock as "version lock" {
        None = 0,
        Lock = 1,
        LockMajor = 2,
        LockMinor = 3,
        LockPatch = 4,
    }
}

byte_enum! {
    /// Minimum release quality acceptable for a dependency target.
    PackageQuality as "package quality" {
        None = 0,
        CI = 1,
        Exploratory = 2,
        Preview = 3,
        ReleaseCandidate = 4,
        Stable = 5,
    }
}

byte_enum! {
    ArtifactDependencyKind as "dependency kind" {
        None = 0,
        Transitive = 1,
        Private = 2,
        Development = 3,
    }
}

/// A typed dependency edge.
///
/// The target is held as its key, not as a pointer: it is a lookup into the
/// store of whichever snapshot the owning instance is read from (see
/// [`InstanceStore::resolve`](crate::store::InstanceStore::resolve)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub target: ArtifactInstance,
    pub lock: SVersionLock,
    pub min_quality: PackageQuality,
    pub kind: ArtifactDependencyKind,
    /// Savors of the owner for which this dependency applies; `None` means all.
    pub applicable_savors: Option<Savors>,
}

impl Reference {
    pub fn new(target: ArtifactInstance) -> Self {
        Self {
            target,
            lock: SVersionLock::None,
            min_quality: PackageQuality::None,
            kind: ArtifactDependencyKind::None,
            applicable_savors: None,
        }
    }

    pub fn with_lock(mut self, lock: SVersionLock) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_min_quality(mut self, min_quality: PackageQuality) -> Self {
        self.min_quality = min_quality;
        self
    }

    pub fn with_kind(mut self, kind: ArtifactDependencyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_applicable_savors(mut self, savors: Option<Savors>) -> Self {
        self.applicable_savors = savors;
        self
    }
}

/// An immutable package node.
///
/// Instances are shared between snapshots through `Arc` and never mutated
/// once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInstance {
    key: ArtifactInstance,
    savors: Option<Savors>,
    state: PackageState,
    dependencies: Box<[Reference]>,
}

impl PackageInstance {
    /// Builds an instance, normalising the dependency savors: they are
    /// dropped when the instance has no savors, and otherwise restricted to
    /// the instance savors. A dependency whose savors share nothing with the
    /// instance savors never applies and is left out.
    pub fn new(
        key: ArtifactInstance,
        savors: Option<Savors>,
        state: PackageState,
        dependencies: impl IntoIterator<Item = Reference>,
    ) -> Self {
        let dependencies = dependencies
            .into_iter()
            .filter_map(|mut dep| {
                dep.applicable_savors = match (&savors, dep.applicable_savors.take()) {
                    (Some(own), Some(applicable)) => Some(own.intersect(&applicable)?),
                    _ => None,
                };
                Some(dep)
            })
            .collect();

        Self {
            key,
            savors,
            state,
            dependencies,
        }
    }

    pub fn key(&self) -> &ArtifactInstance {
        &self.key
    }

    pub fn savors(&self) -> Option<&Savors> {
        self.savors.as_ref()
    }

    pub fn state(&self) -> PackageState {
        self.state
    }

    pub fn is_ghost(&self) -> bool {
        self.state.contains(PackageState::GHOST)
    }

    pub fn dependencies(&self) -> &[Reference] {
        &self.dependencies
    }

    /// Same savors and same dependency list (state is not content).
    pub fn same_content(&self, other: &PackageInstance) -> bool {
        self.savors == other.savors && self.dependencies == other.dependencies
    }

    pub(crate) fn content_summary(&self) -> String {
        let savors = self
            .savors
            .as_ref()
            .map(|s| format!(" [{s}]"))
            .unwrap_or_default();
        let deps: Vec<String> = self
            .dependencies
            .iter()
            .map(|d| d.target.to_string())
            .collect();
        format!("{}{savors} -> [{}]", self.key, deps.join(", "))
    }
}

impl fmt::Display for PackageInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(savors) = &self.savors {
            write!(f, " [{savors}]")?;
        }
        if self.is_ghost() {
            f.write_str(" (ghost)")?;
        }
        Ok(())
    }
}
