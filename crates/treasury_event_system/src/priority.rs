//! Subscriber priorities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority of a subscriber within one event type.
///
/// Variants are declared in ascending order of importance, so the derived `Ord` reads
/// naturally (`Low < High`). Dispatch runs the most important subscribers first, down to
/// [`Lowest`](EventPriority::Lowest), and runs [`Monitor`](EventPriority::Monitor) subscribers
/// after everyone else so they observe the final state of the event. Monitor subscribers
/// should not mutate the event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EventPriority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
    Monitor,
}

impl EventPriority {
    /// Every priority, in declaration order.
    pub const ALL: [EventPriority; 6] = [
        EventPriority::Lowest,
        EventPriority::Low,
        EventPriority::Normal,
        EventPriority::High,
        EventPriority::Highest,
        EventPriority::Monitor,
    ];

    /// Position of this priority in the dispatch sequence; smaller runs earlier.
    pub fn dispatch_rank(self) -> u8 {
        match self {
            EventPriority::Highest => 0,
            EventPriority::High => 1,
            EventPriority::Normal => 2,
            EventPriority::Low => 3,
            EventPriority::Lowest => 4,
            EventPriority::Monitor => 5,
        }
    }
}

impl fmt::Display for EventPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventPriority::Lowest => "lowest",
            EventPriority::Low => "low",
            EventPriority::Normal => "normal",
            EventPriority::High => "high",
            EventPriority::Highest => "highest",
            EventPriority::Monitor => "monitor",
        };
        f.write_str(name)
    }
}
