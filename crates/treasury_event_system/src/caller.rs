//! Per-event-type dispatch

use crate::completion::Completion;
use crate::error::EventError;
use crate::event::{ErasedEvent, Event, EventType};
use crate::executor::{Job, SerialExecutor};
use crate::priority::EventPriority;
use crate::subscriber::EventSubscriber;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

type Dispatch = Box<dyn Fn(&ErasedEvent) -> Completion + Send + Sync>;

struct RegisteredSubscriber {
    name: String,
    priority: EventPriority,
    sequence: u64,
    dispatch: Dispatch,
}

impl RegisteredSubscriber {
    fn dispatch_key(&self) -> (u8, u64) {
        (self.priority.dispatch_rank(), self.sequence)
    }
}

/// Subscribers of one event type, kept in dispatch order, plus the executor they run on.
pub(crate) struct EventCaller {
    event_type: EventType,
    subscribers: ArcSwap<Vec<Arc<RegisteredSubscriber>>>,
    next_sequence: AtomicU64,
    executor: SerialExecutor,
}

impl EventCaller {
    pub(crate) fn new(event_type: EventType, executor: SerialExecutor) -> Self {
        debug!(
            "🔧 Created caller for {} on executor {}",
            event_type.short_name(),
            executor.name()
        );
        Self {
            event_type,
            subscribers: ArcSwap::from_pointee(Vec::new()),
            next_sequence: AtomicU64::new(0),
            executor,
        }
    }

    pub(crate) fn event_type(&self) -> EventType {
        self.event_type
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.load().len()
    }

    /// Adds `subscriber`, keeping the list sorted by priority then registration order.
    pub(crate) fn register<T: ?Sized + Event>(
        &self,
        subscriber: EventSubscriber<T>,
    ) -> Result<(), EventError> {
        if subscriber.event_type() != self.event_type {
            return Err(EventError::TypeMismatch {
                expected: self.event_type.name(),
                found: subscriber.event_type().name(),
            });
        }

        let name = subscriber.name().to_string();
        let priority = subscriber.priority();
        let expected = self.event_type.name();
        let entry = Arc::new(RegisteredSubscriber {
            name: name.clone(),
            priority,
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            dispatch: Box::new(move |event| match event.downcast::<T>() {
                Some(typed) => subscriber.invoke(typed),
                None => Completion::completed_exceptionally(EventError::TypeMismatch {
                    expected,
                    found: event.event_type().name(),
                }),
            }),
        });

        self.subscribers.rcu(|current| {
            let mut next: Vec<_> = current.iter().cloned().collect();
            next.push(Arc::clone(&entry));
            next.sort_by_key(|subscriber| subscriber.dispatch_key());
            next
        });

        debug!(
            "📝 Subscribed {} to {} at {} priority",
            name,
            self.event_type.short_name(),
            priority
        );
        Ok(())
    }

    /// Invokes every subscriber in order on the current thread and joins their outcomes.
    pub(crate) fn call(&self, event: &ErasedEvent) -> Completion {
        let subscribers = self.subscribers.load_full();
        let completions: Vec<Completion> = subscribers
            .iter()
            .map(|subscriber| {
                trace!(
                    "➡️ Dispatching {} to {}",
                    self.event_type.short_name(),
                    subscriber.name
                );
                (subscriber.dispatch)(event)
            })
            .collect();

        Completion::join(&completions)
    }

    /// Runs [`call`](Self::call) on this caller's executor.
    pub(crate) fn schedule(self: &Arc<Self>, event: ErasedEvent) -> Completion {
        let completion = Completion::new();
        let settle = completion.clone();
        let caller = Arc::clone(self);

        let queued = self.executor.execute(Box::new(move || {
            let outcome = caller.call(&event).errors();
            // Nothing else holds `settle`, so it cannot have been completed already.
            let _ = settle.complete_with_errors(outcome);
        }));

        match queued {
            Ok(()) => completion,
            Err(error) => Completion::completed_exceptionally(error),
        }
    }

    /// A pending completion bound to this caller's executor.
    pub(crate) fn create_completion(&self) -> Completion {
        Completion::bound_to(self.executor.clone())
    }

    /// Queues an arbitrary job behind the events already waiting on this caller.
    pub(crate) fn execute(&self, job: Job) -> Result<(), EventError> {
        self.executor.execute(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Tick(u32);

    impl Event for Tick {}

    struct Tock;

    impl Event for Tock {}

    fn caller_for<T: ?Sized + Event>() -> Arc<EventCaller> {
        let event_type = EventType::of::<T>();
        let executor = SerialExecutor::spawn(
            format!("caller-test-{}", event_type.short_name()),
            None,
            event_type.name(),
        )
        .unwrap();
        Arc::new(EventCaller::new(event_type, executor))
    }

    fn recording(
        log: &Arc<Mutex<Vec<String>>>,
        name: &str,
        priority: EventPriority,
    ) -> EventSubscriber<Tick> {
        let log = Arc::clone(log);
        let label = name.to_string();
        EventSubscriber::<Tick>::builder()
            .named(name)
            .with_priority(priority)
            .when_called(move |tick| {
                log.lock().unwrap().push(format!("{}:{}", label, tick.0));
                Ok(())
            })
            .complete_subscription()
            .unwrap()
    }

    #[test]
    fn test_call_respects_priority_and_registration_order() {
        let caller = caller_for::<Tick>();
        let log = Arc::new(Mutex::new(Vec::new()));

        caller.register(recording(&log, "monitor", EventPriority::Monitor)).unwrap();
        caller.register(recording(&log, "low", EventPriority::Low)).unwrap();
        caller.register(recording(&log, "normal-a", EventPriority::Normal)).unwrap();
        caller.register(recording(&log, "highest", EventPriority::Highest)).unwrap();
        caller.register(recording(&log, "normal-b", EventPriority::Normal)).unwrap();

        let completion = caller.call(&ErasedEvent::new(Arc::new(Tick(7))));
        assert!(completion.is_successful());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["highest:7", "normal-a:7", "normal-b:7", "low:7", "monitor:7"]
        );
        assert_eq!(caller.subscriber_count(), 5);
    }

    #[test]
    fn test_call_aggregates_causes_in_order() {
        let caller = caller_for::<Tick>();
        for label in ["first", "second"] {
            caller
                .register(
                    EventSubscriber::<Tick>::builder()
                        .named(label)
                        .when_called(move |_| Err(EventError::custom(label)))
                        .complete_subscription()
                        .unwrap(),
                )
                .unwrap();
        }

        let completion = caller.call(&ErasedEvent::new(Arc::new(Tick(1))));
        assert_eq!(
            completion.errors(),
            vec![EventError::custom("first"), EventError::custom("second")]
        );
    }

    #[test]
    fn test_register_rejects_other_event_type() {
        let caller = caller_for::<Tock>();
        let log = Arc::new(Mutex::new(Vec::new()));

        let result = caller.register(recording(&log, "tick", EventPriority::Normal));
        assert!(matches!(result, Err(EventError::TypeMismatch { .. })));
        assert_eq!(caller.subscriber_count(), 0);
    }

    #[test]
    fn test_schedule_runs_on_executor_thread() {
        let caller = caller_for::<Tick>();
        let thread_name = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&thread_name);

        caller
            .register(
                EventSubscriber::<Tick>::builder()
                    .when_called(move |_| {
                        *seen.lock().unwrap() = std::thread::current().name().map(str::to_string);
                        Ok(())
                    })
                    .complete_subscription()
                    .unwrap(),
            )
            .unwrap();

        let completion = caller.schedule(ErasedEvent::new(Arc::new(Tick(0))));
        assert!(completion.wait_timeout(Duration::from_secs(5)));
        assert!(completion.is_successful());
        assert_eq!(
            thread_name.lock().unwrap().as_deref(),
            Some("caller-test-Tick")
        );
    }
}
