/// Statistics tracking for the event bus
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the bus, suitable for logging and monitoring.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBusStats {
    /// Number of event types with a caller (and therefore an executor thread)
    pub event_types: usize,
    /// Total number of registered subscribers across all event types
    pub subscribers: usize,
    /// Events fired since the bus was created
    pub events_fired: u64,
    /// Fires whose completion settled with at least one cause
    pub failed_fires: u64,
    /// Fires that found no subscriber for the event or any of its supertypes
    pub unhandled_fires: u64,
}

#[derive(Debug, Default)]
pub(crate) struct FireCounters {
    fired: AtomicU64,
    failed: AtomicU64,
    unhandled: AtomicU64,
}

impl FireCounters {
    pub(crate) fn record_fire(&self) {
        self.fired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unhandled(&self) {
        self.unhandled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, event_types: usize, subscribers: usize) -> EventBusStats {
        EventBusStats {
            event_types,
            subscribers,
            events_fired: self.fired.load(Ordering::Relaxed),
            failed_fires: self.failed.load(Ordering::Relaxed),
            unhandled_fires: self.unhandled.load(Ordering::Relaxed),
        }
    }
}
