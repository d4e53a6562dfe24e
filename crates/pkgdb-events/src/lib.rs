//! Diagnostic events for the pkgdb artifact package database.
//!
//! The core never raises control-flow errors for the recoverable conditions it
//! meets while applying a batch; it reports them to an [`EventSink`] supplied
//! by the caller.

mod event;
mod sink;

use std::sync::Arc;

pub use event::*;
pub use sink::*;

/// Shared handle to an event sink.
pub type EventSinkHandle = Arc<dyn EventSink>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink() {
        let sink = NullSink;
        sink.emit(DbEvent::Log {
            level: LogLevel::Info,
            message: "test".to_string(),
        });
    }

    #[test]
    fn test_channel_sink() {
        let (sink, rx) = ChannelSink::new();
        sink.emit(DbEvent::AddRejected {
            reason: RejectReason::UnresolvedDependencies {
                missing: vec!["NuGet:Bar/2.0.0".to_string()],
            },
        });
        sink.emit(DbEvent::Committed {
            serial_number: 1,
            package_changes: 1,
            new_feeds: 1,
            updated_feeds: 0,
            dropped_feeds: 0,
        });

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            DbEvent::AddRejected {
                reason: RejectReason::UnresolvedDependencies { missing }
            } if missing.len() == 1
        ));
        assert!(matches!(
            &events[1],
            DbEvent::Committed {
                serial_number: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_channel_sink_receiver_dropped() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(DbEvent::Log {
            level: LogLevel::Info,
            message: "orphaned".to_string(),
        });
    }

    #[test]
    fn test_collector_sink() {
        let sink = CollectorSink::default();
        assert!(sink.is_empty());

        sink.emit(DbEvent::ContentMismatch {
            package: "NuGet:Foo/1.0.0".to_string(),
            stored: "0 dependencies".to_string(),
            submitted: "1 dependency".to_string(),
        });
        sink.emit(DbEvent::Snapshot {
            serial_number: 3,
            stage: SnapshotStage::Saved {
                bytes: 128,
                compressed: true,
            },
        });

        assert_eq!(sink.len(), 2);
        let events = sink.events();
        assert!(matches!(&events[0], DbEvent::ContentMismatch { .. }));
        assert!(matches!(
            &events[1],
            DbEvent::Snapshot {
                stage: SnapshotStage::Saved {
                    compressed: true,
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn test_event_sink_handle() {
        let collector = Arc::new(CollectorSink::default());
        let sink: EventSinkHandle = collector.clone();
        sink.emit(DbEvent::AddRejected {
            reason: RejectReason::FeedTypeMismatch {
                package: "NuGet:Foo/1.0.0".to_string(),
                feed: "NPM:Main".to_string(),
            },
        });
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_event_sink_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NullSink>();
        assert_send_sync::<ChannelSink>();
        assert_send_sync::<CollectorSink>();
    }
}
