use std::{sync::mpsc::Receiver, thread::JoinHandle};

use nu_ansi_term::Color::{Cyan, Red};
use pkgdb_events::{DbEvent, LogLevel, RejectReason, SnapshotStage};
use pkgdb_utils::bytes::format_bytes;
use tracing::{debug, error, info, warn};

use crate::utils::Colored;

/// Joins the event handler thread.
///
/// Every sender of the channel must be dropped before [`finish`](Self::finish),
/// otherwise the handler keeps waiting for events.
pub struct EventGuard {
    handle: Option<JoinHandle<usize>>,
}

impl EventGuard {
    /// Waits for the remaining events; returns how many content mismatches were seen.
    pub fn finish(mut self) -> usize {
        self.handle
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

pub fn describe_rejection(reason: &RejectReason) -> String {
    match reason {
        RejectReason::FeedTypeMismatch { package, feed } => {
            format!("feed {feed} does not match the type of {package}")
        }
        RejectReason::InvalidFeedName { package, feed } => {
            format!("{package} declares an invalid feed name '{feed}'")
        }
        RejectReason::UnresolvedDependencies { missing } => {
            format!("unresolved dependencies: {}", missing.join(", "))
        }
        RejectReason::InvalidApplicableSavors { package, target } => {
            format!("dependency {target} of {package} applies to none of its savors")
        }
        RejectReason::DependencyCycle { cycle } => {
            format!("dependency cycle: {}", cycle.join(" -> "))
        }
    }
}

fn render(event: DbEvent) -> bool {
    match event {
        DbEvent::AddRejected { reason } => {
            error!("{} {}", Colored(Red, "batch rejected:"), describe_rejection(&reason));
        }
        DbEvent::ContentMismatch {
            package,
            stored,
            submitted,
        } => {
            debug!("{package} changed content: {stored} -> {submitted}");
            return true;
        }
        DbEvent::Committed {
            serial_number,
            package_changes,
            ..
        } => {
            debug!(serial_number, package_changes, "transaction committed");
        }
        DbEvent::Snapshot {
            serial_number,
            stage: SnapshotStage::Saved { bytes, compressed },
        } => {
            info!(
                "Saved snapshot #{} ({}{})",
                Colored(Cyan, serial_number),
                format_bytes(bytes, 2),
                if compressed { ", zstd" } else { "" }
            );
        }
        DbEvent::Snapshot {
            serial_number,
            stage: SnapshotStage::Loaded { instances, feeds },
        } => {
            debug!(serial_number, instances, feeds, "snapshot loaded");
        }
        DbEvent::Log { level, message } => {
            match level {
                LogLevel::Debug => debug!("{message}"),
                LogLevel::Info => info!("{message}"),
                LogLevel::Warning => warn!("{message}"),
                LogLevel::Error => error!("{message}"),
            }
        }
    }
    false
}

pub fn spawn_event_handler(receiver: Receiver<DbEvent>) -> EventGuard {
    let handle = std::thread::spawn(move || {
        let mut mismatches = 0;
        while let Ok(event) = receiver.recv() {
            if render(event) {
                mismatches += 1;
            }
        }
        mismatches
    });

    EventGuard {
        handle: Some(handle),
    }
}
