//! The event bus: registration, firing and supertype fan-out

use crate::caller::EventCaller;
use crate::completion::Completion;
use crate::config::EventBusConfig;
use crate::error::EventError;
use crate::event::{ErasedEvent, Event, EventType};
use crate::executor::SerialExecutor;
use crate::stats::{EventBusStats, FireCounters};
use crate::subscriber::{EventSubscriber, EventSubscriberBuilder};
use crate::tracker::EventTypeTracker;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Typed, priority-ordered publish/subscribe hub.
///
/// Every event type that gets a subscriber (or is fired towards a subscribed supertype) gets
/// a dedicated executor thread. Events of one type are dispatched one after another on that
/// thread; different types run in parallel. Firing never blocks: it returns a [`Completion`]
/// that settles once every interested subscriber is done.
///
/// The bus is an explicit context object. Share it as `Arc<EventBus>`.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::time::Duration;
/// use treasury_event_system::{Event, EventBus};
///
/// struct BalanceChecked {
///     balance: u64,
/// }
///
/// impl Event for BalanceChecked {}
///
/// let bus = EventBus::new();
/// let total = Arc::new(AtomicU64::new(0));
/// let seen = Arc::clone(&total);
///
/// bus.subscribe(
///     bus.subscription_for::<BalanceChecked>()
///         .when_called(move |event| {
///             seen.fetch_add(event.balance, Ordering::SeqCst);
///             Ok(())
///         })
///         .complete_subscription()?,
/// )?;
///
/// let completion = bus.fire(BalanceChecked { balance: 250 });
/// assert!(completion.wait_timeout(Duration::from_secs(5)));
/// assert!(completion.is_successful());
/// assert_eq!(total.load(Ordering::SeqCst), 250);
/// # Ok::<(), treasury_event_system::EventError>(())
/// ```
pub struct EventBus {
    callers: DashMap<EventType, Arc<EventCaller>>,
    types: EventTypeTracker,
    config: EventBusConfig,
    counters: Arc<FireCounters>,
}

impl EventBus {
    /// Creates a bus with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Creates a bus with the given configuration.
    pub fn with_config(config: EventBusConfig) -> Self {
        info!(
            "🔧 Event bus created (executor threads: {}-*)",
            config.thread_name_prefix
        );
        Self {
            callers: DashMap::new(),
            types: EventTypeTracker::new(),
            config,
            counters: Arc::new(FireCounters::default()),
        }
    }

    /// The configuration this bus was created with.
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Starts a subscription for events of type `T`.
    pub fn subscription_for<T: ?Sized + Event>(&self) -> EventSubscriberBuilder<T> {
        EventSubscriber::builder()
    }

    /// Registers `subscriber`, creating the executor of its event type on first use.
    ///
    /// # Errors
    ///
    /// [`EventError::ExecutorUnavailable`] if the executor thread cannot be started.
    pub fn subscribe<T: ?Sized + Event>(
        &self,
        subscriber: EventSubscriber<T>,
    ) -> Result<(), EventError> {
        self.caller_for(subscriber.event_type())?
            .register(subscriber)
    }

    /// Fires `event` and returns a completion that settles once all subscribers are done.
    ///
    /// Subscribers of `T` run first, in priority order, on the executor of `T`. Subscribers of
    /// each registered supertype of `T` are then handed the same instance on their own
    /// executors. The returned completion carries the causes of every failed subscriber.
    pub fn fire<T: Event>(&self, event: T) -> Completion {
        self.fire_shared(Arc::new(event))
    }

    /// Like [`fire`](Self::fire), for an event that is already shared.
    ///
    /// This is also how trait-object events are fired: `bus.fire_shared::<dyn Trait>(arc)`.
    pub fn fire_shared<T: ?Sized + Event>(&self, event: Arc<T>) -> Completion {
        self.counters.record_fire();
        let event_type = EventType::of::<T>();

        let friends = self
            .types
            .friends_of::<T, _>(|supertype| self.callers.contains_key(supertype));
        let concrete = self.callers.get(&event_type).map(|entry| Arc::clone(entry.value()));

        if concrete.is_none() && friends.is_empty() {
            self.counters.record_unhandled();
            if self.config.warn_on_unhandled {
                warn!("📭 Event {} fired with no subscribers", event_type.short_name());
            } else {
                debug!("📭 Event {} fired with no subscribers", event_type.short_name());
            }
            return Completion::completed();
        }

        let caller = match concrete {
            Some(caller) => caller,
            None => match self.caller_for(event_type) {
                Ok(caller) => caller,
                Err(error) => {
                    self.counters.record_failure();
                    return Completion::completed_exceptionally(error);
                }
            },
        };

        let friend_calls: Vec<(Arc<EventCaller>, ErasedEvent)> = friends
            .iter()
            .filter_map(|friend| {
                let friend_caller = self.callers.get(&friend.event_type())?;
                Some((
                    Arc::clone(friend_caller.value()),
                    friend.upcast(Arc::clone(&event)),
                ))
            })
            .collect();

        debug!(
            "🚀 Firing {} ({} supertype caller(s))",
            event_type.short_name(),
            friend_calls.len()
        );

        let completion = caller.create_completion();
        let settle = completion.clone();
        let counters = Arc::clone(&self.counters);
        let dispatcher = Arc::clone(&caller);
        let event = ErasedEvent::new(event);

        let queued = caller.execute(Box::new(move || {
            let mut outcomes = vec![dispatcher.call(&event)];
            outcomes.extend(
                friend_calls
                    .into_iter()
                    .map(|(friend, upcast)| friend.schedule(upcast)),
            );

            let causes = Completion::join(&outcomes).errors();
            if !causes.is_empty() {
                counters.record_failure();
                debug!(
                    "❌ Event {} completed with {} cause(s)",
                    dispatcher.event_type().short_name(),
                    causes.len()
                );
            }
            // Only this job settles `settle`.
            let _ = settle.complete_with_errors(causes);
        }));

        match queued {
            Ok(()) => completion,
            Err(error) => {
                self.counters.record_failure();
                Completion::completed_exceptionally(error)
            }
        }
    }

    /// Returns a fresh pending completion tied to the executor of `T`, creating it if needed.
    ///
    /// Useful for asynchronous subscribers that settle their result from elsewhere.
    ///
    /// # Errors
    ///
    /// [`EventError::ExecutorUnavailable`] if the executor thread cannot be started.
    pub fn create_completion<T: ?Sized + Event>(&self) -> Result<Completion, EventError> {
        Ok(self.caller_for(EventType::of::<T>())?.create_completion())
    }

    /// Event types that currently have a caller, in no particular order.
    pub fn event_types(&self) -> Vec<EventType> {
        self.callers.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of subscribers registered directly for `T`.
    pub fn subscriber_count<T: ?Sized + Event>(&self) -> usize {
        self.callers
            .get(&EventType::of::<T>())
            .map_or(0, |caller| caller.subscriber_count())
    }

    /// Current statistics.
    pub fn stats(&self) -> EventBusStats {
        let subscribers = self
            .callers
            .iter()
            .map(|entry| entry.value().subscriber_count())
            .sum();
        self.counters.snapshot(self.callers.len(), subscribers)
    }

    fn caller_for(&self, event_type: EventType) -> Result<Arc<EventCaller>, EventError> {
        if let Some(caller) = self.callers.get(&event_type) {
            return Ok(Arc::clone(caller.value()));
        }

        let entry = self.callers.entry(event_type).or_try_insert_with(|| {
            let executor = SerialExecutor::spawn(
                self.config.thread_name_for(event_type.short_name()),
                self.config.thread_stack_size,
                event_type.name(),
            )?;
            Ok::<_, EventError>(Arc::new(EventCaller::new(event_type, executor)))
        })?;

        Ok(Arc::clone(entry.value()))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
