use std::sync::{
    mpsc::{self, Receiver, Sender},
    Mutex, PoisonError,
};

use crate::DbEvent;

/// Trait for consuming diagnostics.
///
/// Each embedding application provides its own implementation.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DbEvent);
}

/// Channel-based event sink.
///
/// Sends events through a standard mpsc channel. The receiver end
/// can be polled by any consumer (UI, persistence writer, test harness).
pub struct ChannelSink {
    sender: Sender<DbEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<DbEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: DbEvent) {
        let _ = self.sender.send(event);
    }
}

/// No-op event sink for tests or headless operation.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: DbEvent) {}
}

/// Collector sink that stores all events for inspection.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<DbEvent>>,
}

impl CollectorSink {
    pub fn events(&self) -> Vec<DbEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: DbEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}
