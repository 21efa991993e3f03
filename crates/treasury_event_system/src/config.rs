//! Event bus configuration

use serde::{Deserialize, Serialize};

/// Smallest stack accepted for executor threads.
pub const MIN_THREAD_STACK_SIZE: usize = 64 * 1024;

fn default_thread_name_prefix() -> String {
    "treasury-events".to_string()
}

/// Tunables of an [`EventBus`](crate::EventBus).
///
/// Usually embedded as the `[event_bus]` table of the host configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Prefix of executor thread names; the event type's short name is appended
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
    /// Stack size of executor threads in bytes (platform default when unset)
    #[serde(default)]
    pub thread_stack_size: Option<usize>,
    /// Log a warning when an event is fired that nobody listens to
    #[serde(default)]
    pub warn_on_unhandled: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: default_thread_name_prefix(),
            thread_stack_size: None,
            warn_on_unhandled: false,
        }
    }
}

impl EventBusConfig {
    /// Checks the configuration for values the bus cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_name_prefix.trim().is_empty() {
            return Err("Event bus thread name prefix cannot be empty".to_string());
        }

        if self.thread_name_prefix.contains('\0') {
            return Err("Event bus thread name prefix cannot contain NUL bytes".to_string());
        }

        if let Some(stack_size) = self.thread_stack_size {
            if stack_size < MIN_THREAD_STACK_SIZE {
                return Err(format!(
                    "Event bus thread stack size must be at least {} bytes, got {}",
                    MIN_THREAD_STACK_SIZE, stack_size
                ));
            }
        }

        Ok(())
    }

    pub(crate) fn thread_name_for(&self, short_name: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, short_name)
    }
}
