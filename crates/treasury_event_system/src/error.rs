//! Error types for the Treasury event system

/// Errors produced by the event bus, its subscribers and completions.
///
/// `EventError` is also the cause type carried by a failed [`Completion`](crate::Completion),
/// which is why it is `Clone`: the same causes are handed to every observer of a completion
/// and concatenated when completions are joined.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// A completion was completed a second time
    #[error("Completion already completed")]
    AlreadyCompleted,

    /// A subscription was built without a handler
    #[error("Subscription for {event_type} has no handler")]
    MissingHandler {
        /// Type name of the event the subscription was for
        event_type: &'static str,
    },

    /// A subscriber reported a failure
    #[error("Handler {subscriber} failed: {message}")]
    HandlerFailed {
        /// Diagnostic name of the subscriber
        subscriber: String,
        /// Failure description
        message: String,
    },

    /// A subscriber panicked while handling an event
    #[error("Handler {subscriber} panicked: {message}")]
    HandlerPanicked {
        /// Diagnostic name of the subscriber
        subscriber: String,
        /// Panic payload, when it was a string
        message: String,
    },

    /// An event reached a caller registered for a different type
    #[error("Event of type {expected} could not be delivered: {found} received")]
    TypeMismatch {
        /// Type the caller dispatches
        expected: &'static str,
        /// Type that was actually delivered
        found: &'static str,
    },

    /// An async subscription was built outside of a tokio runtime
    #[error("No async runtime available: {0}")]
    RuntimeUnavailable(String),

    /// The dedicated executor of an event type could not be started or reached
    #[error("Event executor for {event_type} is unavailable: {reason}")]
    ExecutorUnavailable {
        /// Type name of the event the executor serves
        event_type: &'static str,
        /// Underlying failure
        reason: String,
    },

    /// Free-form failure reported by a handler
    #[error("{0}")]
    Custom(String),
}

impl EventError {
    /// Creates a free-form error, the usual way for a handler to reject an event.
    pub fn custom(message: impl Into<String>) -> Self {
        EventError::Custom(message.into())
    }

    /// Creates a handler failure attributed to a named subscriber.
    pub fn handler_failed(subscriber: impl Into<String>, message: impl Into<String>) -> Self {
        EventError::HandlerFailed {
            subscriber: subscriber.into(),
            message: message.into(),
        }
    }

    /// Builds a [`EventError::HandlerPanicked`] from a caught panic payload.
    pub(crate) fn from_panic(subscriber: &str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };

        EventError::HandlerPanicked {
            subscriber: subscriber.to_string(),
            message,
        }
    }
}
