//! Event subscribers and their builder

use crate::completion::Completion;
use crate::error::EventError;
use crate::event::{Event, EventType};
use crate::priority::EventPriority;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Handler that finishes its work before returning.
pub type SyncHandler<T> = Arc<dyn Fn(Arc<T>) -> Result<(), EventError> + Send + Sync>;

/// Handler that reports when it is done through the returned [`Completion`].
pub type AsyncHandler<T> = Arc<dyn Fn(Arc<T>) -> Completion + Send + Sync>;

type FutureHandler<T> =
    Arc<dyn Fn(Arc<T>) -> BoxFuture<'static, Result<(), EventError>> + Send + Sync>;

/// The two shapes a subscriber can take.
pub enum Handler<T: ?Sized> {
    /// Runs to completion on the dispatching thread
    Sync(SyncHandler<T>),
    /// May keep working after it returns; done once its completion settles
    Async(AsyncHandler<T>),
}

impl<T: ?Sized> Clone for Handler<T> {
    fn clone(&self) -> Self {
        match self {
            Handler::Sync(handler) => Handler::Sync(Arc::clone(handler)),
            Handler::Async(handler) => Handler::Async(Arc::clone(handler)),
        }
    }
}

/// An immutable registration of interest in events of type `T`.
///
/// Built with [`EventBus::subscription_for`](crate::EventBus::subscription_for) or
/// [`EventSubscriber::builder`] and handed to [`EventBus::subscribe`](crate::EventBus::subscribe).
pub struct EventSubscriber<T: ?Sized> {
    event_type: EventType,
    priority: EventPriority,
    name: String,
    handler: Handler<T>,
}

impl<T: ?Sized + Event> EventSubscriber<T> {
    /// Starts building a subscriber for `T`.
    pub fn builder() -> EventSubscriberBuilder<T> {
        EventSubscriberBuilder::new()
    }

    /// Token of the event type this subscriber listens to.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Priority of this subscriber within its event type.
    pub fn priority(&self) -> EventPriority {
        self.priority
    }

    /// Diagnostic name used in logs and failure causes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The handler this subscriber runs.
    pub fn handler(&self) -> &Handler<T> {
        &self.handler
    }

    /// Runs the handler for `event`.
    ///
    /// Synchronous handlers yield an already settled completion. Errors and panics never
    /// escape: they become the causes of the returned completion.
    pub fn invoke(&self, event: Arc<T>) -> Completion {
        let invocation = catch_unwind(AssertUnwindSafe(|| match &self.handler {
            Handler::Sync(handler) => match handler(event) {
                Ok(()) => Completion::completed(),
                Err(error) => Completion::completed_exceptionally(error),
            },
            Handler::Async(handler) => handler(event),
        }));

        invocation.unwrap_or_else(|payload| {
            let error = EventError::from_panic(&self.name, payload);
            warn!("💥 Subscriber {} panicked: {}", self.name, error);
            Completion::completed_exceptionally(error)
        })
    }
}

impl<T: ?Sized> Clone for EventSubscriber<T> {
    fn clone(&self) -> Self {
        Self {
            event_type: self.event_type,
            priority: self.priority,
            name: self.name.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for EventSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.handler {
            Handler::Sync(_) => "sync",
            Handler::Async(_) => "async",
        };
        f.debug_struct("EventSubscriber")
            .field("event_type", &self.event_type)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("handler", &shape)
            .finish()
    }
}

enum PendingHandler<T: ?Sized> {
    Ready(Handler<T>),
    Future(FutureHandler<T>),
}

/// Builder for [`EventSubscriber`].
///
/// Exactly one handler is kept; setting another replaces the previous one. Priority defaults
/// to [`EventPriority::Normal`] and the name to the event type's short name.
///
/// # Examples
///
/// ```rust
/// use treasury_event_system::{EventBus, EventPriority, Event};
///
/// struct PaydayEvent {
///     amount: u64,
/// }
///
/// impl Event for PaydayEvent {}
///
/// let bus = EventBus::new();
/// let subscriber = bus
///     .subscription_for::<PaydayEvent>()
///     .with_priority(EventPriority::High)
///     .named("payday-limits")
///     .when_called(|event| {
///         println!("payday of {}", event.amount);
///         Ok(())
///     })
///     .complete_subscription()?;
///
/// bus.subscribe(subscriber)?;
/// # Ok::<(), treasury_event_system::EventError>(())
/// ```
pub struct EventSubscriberBuilder<T: ?Sized> {
    priority: EventPriority,
    name: Option<String>,
    handler: Option<PendingHandler<T>>,
}

impl<T: ?Sized + Event> EventSubscriberBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            priority: EventPriority::default(),
            name: None,
            handler: None,
        }
    }

    /// Sets the priority of the subscriber.
    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the diagnostic name of the subscriber.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Uses a synchronous handler.
    pub fn when_called<F>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<T>) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.handler = Some(PendingHandler::Ready(Handler::Sync(Arc::new(handler))));
        self
    }

    /// Uses a handler that signals its own completion.
    pub fn when_called_with_completion<F>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<T>) -> Completion + Send + Sync + 'static,
    {
        self.handler = Some(PendingHandler::Ready(Handler::Async(Arc::new(handler))));
        self
    }

    /// Uses an `async` handler.
    ///
    /// Each invocation is spawned on the tokio runtime that is current when
    /// [`complete_subscription`](Self::complete_subscription) is called.
    pub fn when_called_async<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventError>> + Send + 'static,
    {
        self.handler = Some(PendingHandler::Future(Arc::new(move |event| {
            handler(event).boxed()
        })));
        self
    }

    /// Finishes the subscriber.
    ///
    /// # Errors
    ///
    /// [`EventError::MissingHandler`] if no handler was set, and
    /// [`EventError::RuntimeUnavailable`] if an `async` handler is built outside a tokio
    /// runtime.
    pub fn complete_subscription(self) -> Result<EventSubscriber<T>, EventError> {
        let event_type = EventType::of::<T>();
        let name = self
            .name
            .unwrap_or_else(|| event_type.short_name().to_string());

        let handler = match self.handler {
            Some(PendingHandler::Ready(handler)) => handler,
            Some(PendingHandler::Future(handler)) => spawn_on_current_runtime(&name, handler)?,
            None => {
                return Err(EventError::MissingHandler {
                    event_type: event_type.name(),
                })
            }
        };

        Ok(EventSubscriber {
            event_type,
            priority: self.priority,
            name,
            handler,
        })
    }
}

/// Settles the completion of one async invocation.
///
/// The guard travels inside the spawned task. A runtime that shuts down drops its tasks
/// without polling them to the end; the guard then settles the completion with
/// [`EventError::RuntimeUnavailable`] so the dispatching executor is released.
struct SettleGuard {
    subscriber: String,
    completion: Option<Completion>,
}

impl SettleGuard {
    fn settle(mut self, outcome: Result<(), Vec<EventError>>) {
        if let Some(completion) = self.completion.take() {
            if let Err(e) = completion.complete_with(outcome) {
                warn!("⚠️ Subscriber {} settled twice: {}", self.subscriber, e);
            }
        }
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            warn!(
                "⚠️ Task of subscriber {} was dropped before it finished",
                self.subscriber
            );
            let _ = completion.complete_exceptionally(EventError::RuntimeUnavailable(format!(
                "task of subscriber {} dropped before completion",
                self.subscriber
            )));
        }
    }
}

fn spawn_on_current_runtime<T: ?Sized + Event>(
    name: &str,
    handler: FutureHandler<T>,
) -> Result<Handler<T>, EventError> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| EventError::RuntimeUnavailable(e.to_string()))?;
    let name = name.to_string();

    Ok(Handler::Async(Arc::new(move |event| {
        let completion = Completion::new();
        let guard = SettleGuard {
            subscriber: name.clone(),
            completion: Some(completion.clone()),
        };
        let work = AssertUnwindSafe(handler(event)).catch_unwind();

        runtime.spawn(async move {
            let outcome = match work.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(error)) => Err(vec![error]),
                Err(payload) => Err(vec![EventError::from_panic(&guard.subscriber, payload)]),
            };
            guard.settle(outcome);
        });

        completion
    })))
}
