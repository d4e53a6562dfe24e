//! Change sets describing one database transition.

use std::sync::Arc;

use bitflags::bitflags;

use crate::{database::PackageDatabase, feed::PackageFeed, instance::PackageInstance};

bitflags! {
    /// What happened to one package during a transaction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PackageEventKind: u8 {
        const ADDED = 1;
        const CONTENT_CHANGED = 1 << 1;
        const STATE_CHANGED = 1 << 2;
    }
}

#[derive(Debug, Clone)]
pub struct PackageChangedInfo {
    pub kind: PackageEventKind,
    pub instance: Arc<PackageInstance>,
    /// The replaced instance; `None` for additions.
    pub previous: Option<Arc<PackageInstance>>,
}

/// The rebuild of one existing feed.
#[derive(Debug, Clone)]
pub struct FeedChangedInfo {
    pub previous: Arc<PackageFeed>,
    pub feed: Arc<PackageFeed>,
    pub added: Vec<Arc<PackageInstance>>,
    pub updated: Vec<Arc<PackageInstance>>,
    pub removed: Vec<Arc<PackageInstance>>,
}

/// The result of a mutation: the resulting database and everything that
/// differs from the one the mutation was applied to.
#[derive(Debug, Clone)]
pub struct ChangedInfo {
    pub db: Arc<PackageDatabase>,
    pub package_changes: Vec<PackageChangedInfo>,
    pub new_feeds: Vec<Arc<PackageFeed>>,
    pub feed_changes: Vec<FeedChangedInfo>,
    pub dropped_feeds: Vec<Arc<PackageFeed>>,
}

impl ChangedInfo {
    pub(crate) fn unchanged(db: Arc<PackageDatabase>) -> Self {
        Self {
            db,
            package_changes: Vec::new(),
            new_feeds: Vec::new(),
            feed_changes: Vec::new(),
            dropped_feeds: Vec::new(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !(self.package_changes.is_empty()
            && self.new_feeds.is_empty()
            && self.feed_changes.is_empty()
            && self.dropped_feeds.is_empty())
    }

    pub fn added(&self) -> impl Iterator<Item = &PackageChangedInfo> {
        self.package_changes
            .iter()
            .filter(|c| c.kind.contains(PackageEventKind::ADDED))
    }

    /// One line per change, for logs and CLI output.
    pub fn summary(&self) -> String {
        format!(
            "serial {}: {} package change(s), {} new feed(s), {} updated feed(s), {} dropped feed(s)",
            self.db.serial_number(),
            self.package_changes.len(),
            self.new_feeds.len(),
            self.feed_changes.len(),
            self.dropped_feeds.len()
        )
    }
}
