//! One-shot completions.
//!
//! A [`Completion`] is the result handle handed out by [`EventBus::fire`](crate::EventBus::fire)
//! and returned by asynchronous subscribers. It starts pending and is settled exactly once,
//! either successfully or with one or more [`EventError`] causes. Observers can block on it,
//! poll it, await it as a future or register a single continuation.
//!
//! Completions handed out by the bus are bound to the executor of their event type, so a
//! continuation registered with [`Completion::when_complete_async`] runs on that executor.

use crate::error::EventError;
use crate::executor::SerialExecutor;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tracing::warn;

type Continuation = Box<dyn FnOnce(&[EventError]) + Send + 'static>;

#[derive(Default)]
struct State {
    /// `Some` once settled; an empty slice means success
    outcome: Option<Arc<[EventError]>>,
    continuation: Option<Continuation>,
    wakers: Vec<Waker>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    settled: Condvar,
    /// Where `when_complete_async` continuations run
    executor: Option<SerialExecutor>,
}

/// Thread-safe, settable-once result placeholder.
///
/// Cloning a `Completion` clones the handle, not the result: every clone observes the same
/// state. Whoever created the completion is expected to settle it; everyone else observes.
///
/// # Examples
///
/// ```rust
/// use treasury_event_system::{Completion, EventError};
///
/// let completion = Completion::new();
/// let observer = completion.clone();
///
/// std::thread::spawn(move || {
///     completion.complete_exceptionally(EventError::custom("insufficient funds")).ok();
/// });
///
/// observer.wait_completion();
/// assert_eq!(observer.errors(), vec![EventError::custom("insufficient funds")]);
/// ```
#[derive(Clone, Default)]
pub struct Completion {
    shared: Arc<Shared>,
}

impl Completion {
    /// Creates a pending completion.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a completion that already succeeded.
    pub fn completed() -> Self {
        Self::settled(Vec::new())
    }

    /// Creates a completion that already failed with a single cause.
    pub fn completed_exceptionally(cause: EventError) -> Self {
        Self::settled(vec![cause])
    }

    /// Creates a completion that already settled with the given causes.
    ///
    /// An empty set of causes yields a successful completion.
    pub fn completed_with_errors(causes: impl IntoIterator<Item = EventError>) -> Self {
        Self::settled(causes.into_iter().collect())
    }

    /// Creates a pending completion whose async continuations run on `executor`.
    pub(crate) fn bound_to(executor: SerialExecutor) -> Self {
        Self {
            shared: Arc::new(Shared {
                executor: Some(executor),
                ..Shared::default()
            }),
        }
    }

    /// Name of the executor thread this completion is bound to, if any.
    pub fn executor_name(&self) -> Option<&str> {
        self.shared.executor.as_ref().map(SerialExecutor::name)
    }

    fn settled(causes: Vec<EventError>) -> Self {
        let completion = Self::new();
        completion.lock().outcome = Some(causes.into());
        completion
    }

    /// Marks the completion as successful.
    ///
    /// Wakes every blocked waiter and runs the registered continuation, if any, on the
    /// calling thread.
    ///
    /// # Errors
    ///
    /// [`EventError::AlreadyCompleted`] if the completion was settled before.
    pub fn complete(&self) -> Result<(), EventError> {
        self.settle(Vec::new())
    }

    /// Marks the completion as failed with a single cause.
    ///
    /// # Errors
    ///
    /// [`EventError::AlreadyCompleted`] if the completion was settled before.
    pub fn complete_exceptionally(&self, cause: EventError) -> Result<(), EventError> {
        self.settle(vec![cause])
    }

    /// Marks the completion as settled with the given causes, in order.
    ///
    /// # Errors
    ///
    /// [`EventError::AlreadyCompleted`] if the completion was settled before.
    pub fn complete_with_errors(
        &self,
        causes: impl IntoIterator<Item = EventError>,
    ) -> Result<(), EventError> {
        self.settle(causes.into_iter().collect())
    }

    /// Settles the completion from a `Result`.
    ///
    /// # Errors
    ///
    /// [`EventError::AlreadyCompleted`] if the completion was settled before.
    pub fn complete_with(&self, outcome: Result<(), Vec<EventError>>) -> Result<(), EventError> {
        self.settle(outcome.err().unwrap_or_default())
    }

    fn settle(&self, causes: Vec<EventError>) -> Result<(), EventError> {
        let outcome: Arc<[EventError]> = causes.into();

        let (continuation, wakers) = {
            let mut state = self.lock();
            if state.outcome.is_some() {
                return Err(EventError::AlreadyCompleted);
            }
            state.outcome = Some(Arc::clone(&outcome));
            (state.continuation.take(), std::mem::take(&mut state.wakers))
        };

        self.shared.settled.notify_all();
        for waker in wakers {
            waker.wake();
        }
        if let Some(continuation) = continuation {
            continuation(&outcome);
        }
        Ok(())
    }

    /// Returns `true` once the completion has been settled.
    pub fn is_completed(&self) -> bool {
        self.lock().outcome.is_some()
    }

    /// Returns `true` if the completion settled without causes.
    ///
    /// A pending completion is not successful.
    pub fn is_successful(&self) -> bool {
        matches!(&self.lock().outcome, Some(outcome) if outcome.is_empty())
    }

    /// Returns the outcome without blocking, or `None` while pending.
    pub fn outcome(&self) -> Option<Result<(), Vec<EventError>>> {
        self.lock().outcome.as_deref().map(to_result)
    }

    /// Returns the recorded causes.
    ///
    /// Always safe to call: a pending or successful completion has no causes.
    pub fn errors(&self) -> Vec<EventError> {
        self.lock()
            .outcome
            .as_deref()
            .map(<[EventError]>::to_vec)
            .unwrap_or_default()
    }

    /// Blocks the calling thread until the completion is settled.
    ///
    /// Never fails; inspect [`errors`](Self::errors) afterwards for the outcome.
    pub fn wait_completion(&self) {
        let mut state = self.lock();
        while state.outcome.is_none() {
            state = self
                .shared
                .settled
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks for at most `timeout`; returns whether the completion is settled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .shared
            .settled
            .wait_timeout_while(state, timeout, |state| state.outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        state.outcome.is_some()
    }

    /// Registers the continuation to run once the completion is settled.
    ///
    /// If the completion is already settled the continuation runs right away on the calling
    /// thread. Otherwise it is stored and run by the thread that settles the completion; this
    /// call never blocks. Only one continuation is kept: registering again replaces a
    /// continuation that has not run yet.
    pub fn when_complete<F>(&self, continuation: F)
    where
        F: FnOnce(&[EventError]) + Send + 'static,
    {
        let outcome = {
            let mut state = self.lock();
            match state.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    state.continuation = Some(Box::new(continuation));
                    return;
                }
            }
        };
        continuation(&outcome);
    }

    /// Registers the continuation to run on the bound executor once the completion is settled.
    ///
    /// The continuation is queued behind the events already waiting on that executor; this call
    /// never blocks. It shares the single continuation slot with
    /// [`when_complete`](Self::when_complete). A completion that is not bound to an executor
    /// behaves exactly like `when_complete`.
    pub fn when_complete_async<F>(&self, continuation: F)
    where
        F: FnOnce(&[EventError]) + Send + 'static,
    {
        let Some(executor) = self.shared.executor.clone() else {
            self.when_complete(continuation);
            return;
        };

        self.when_complete(move |errors| {
            let errors = errors.to_vec();
            if let Err(e) = executor.execute(Box::new(move || continuation(&errors))) {
                warn!("⚠️ Dropped completion continuation: {}", e);
            }
        });
    }

    /// Waits for every completion in turn and aggregates their causes, preserving input order.
    ///
    /// The returned completion is already settled. Joining nothing succeeds.
    pub fn join<'a, I>(completions: I) -> Completion
    where
        I: IntoIterator<Item = &'a Completion>,
    {
        let mut causes = Vec::new();
        for completion in completions {
            completion.wait_completion();
            causes.extend(completion.errors());
        }
        Completion::completed_with_errors(causes)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_result(causes: &[EventError]) -> Result<(), Vec<EventError>> {
    if causes.is_empty() {
        Ok(())
    } else {
        Err(causes.to_vec())
    }
}

impl Future for Completion {
    type Output = Result<(), Vec<EventError>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.lock();
        if let Some(outcome) = state.outcome.as_deref() {
            return Poll::Ready(to_result(outcome));
        }
        if !state.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        let status = match state.outcome.as_deref() {
            None => "pending",
            Some([]) => "completed",
            Some(_) => "failed",
        };
        f.debug_struct("Completion")
            .field("status", &status)
            .field("errors", &state.outcome.as_deref().unwrap_or_default())
            .field("has_continuation", &state.continuation.is_some())
            .field("executor", &self.executor_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn boom(n: u32) -> EventError {
        EventError::custom(format!("boom {n}"))
    }

    #[test]
    fn test_second_settle_is_rejected() {
        let settlers: [fn(&Completion) -> Result<(), EventError>; 3] = [
            |c| c.complete(),
            |c| c.complete_exceptionally(boom(1)),
            |c| c.complete_with_errors(vec![boom(1), boom(2)]),
        ];

        for first in &settlers {
            for second in &settlers {
                let completion = Completion::new();
                assert!(first(&completion).is_ok());
                assert_eq!(second(&completion), Err(EventError::AlreadyCompleted));
            }
        }

        assert_eq!(Completion::completed().complete(), Err(EventError::AlreadyCompleted));
        assert_eq!(
            Completion::completed_exceptionally(boom(1)).complete(),
            Err(EventError::AlreadyCompleted)
        );
    }

    #[test]
    fn test_second_settle_keeps_first_outcome() {
        let completion = Completion::new();
        completion.complete_exceptionally(boom(1)).unwrap();
        let _ = completion.complete();
        assert_eq!(completion.errors(), vec![boom(1)]);
    }

    #[test]
    fn test_errors_are_empty_while_pending() {
        let completion = Completion::new();
        assert!(completion.errors().is_empty());
        assert!(!completion.is_completed());
        assert!(!completion.is_successful());
        assert_eq!(completion.outcome(), None);
    }

    #[test]
    fn test_errors_preserve_order() {
        let completion = Completion::new();
        completion.complete_with_errors(vec![boom(1), boom(2)]).unwrap();
        assert_eq!(completion.errors(), vec![boom(1), boom(2)]);
        assert_eq!(completion.outcome(), Some(Err(vec![boom(1), boom(2)])));
    }

    #[test]
    fn test_empty_causes_mean_success() {
        let completion = Completion::completed_with_errors(Vec::new());
        assert!(completion.is_successful());

        let completion = Completion::new();
        completion.complete_with(Ok(())).unwrap();
        assert_eq!(completion.outcome(), Some(Ok(())));
    }

    #[test]
    fn test_join() {
        let failed = Completion::completed_exceptionally(boom(1));
        let joined = Completion::join([&Completion::completed(), &failed]);
        assert!(joined.is_completed());
        assert_eq!(joined.errors(), vec![boom(1)]);

        let joined = Completion::join(Vec::<&Completion>::new());
        assert!(joined.is_successful());

        let joined = Completion::join(&[
            Completion::completed_with_errors(vec![boom(1), boom(2)]),
            Completion::completed(),
            Completion::completed_exceptionally(boom(3)),
        ]);
        assert_eq!(joined.errors(), vec![boom(1), boom(2), boom(3)]);
    }

    #[test]
    fn test_join_waits_for_pending_inputs() {
        let slow = Completion::new();
        let settler = slow.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            settler.complete_exceptionally(boom(7)).unwrap();
        });

        let joined = Completion::join([&Completion::completed(), &slow]);
        assert_eq!(joined.errors(), vec![boom(7)]);
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_completion_across_threads() {
        let completion = Completion::new();
        let settler = completion.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            settler.complete().unwrap();
        });

        completion.wait_completion();
        assert!(completion.is_successful());
    }

    #[test]
    fn test_wait_timeout() {
        let completion = Completion::new();
        assert!(!completion.wait_timeout(Duration::from_millis(10)));
        completion.complete().unwrap();
        assert!(completion.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_continuation_runs_immediately_when_settled() {
        let completion = Completion::completed_exceptionally(boom(1));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        completion.when_complete(move |errors| sink.lock().unwrap().extend_from_slice(errors));

        assert_eq!(*seen.lock().unwrap(), vec![boom(1)]);
    }

    #[test]
    fn test_continuation_runs_on_settle_without_blocking() {
        let completion = Completion::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        completion.when_complete(move |errors| {
            assert!(errors.is_empty());
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        completion.complete().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_continuation_last_registration_wins() {
        let completion = Completion::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let (first_counter, second_counter) = (Arc::clone(&first), Arc::clone(&second));

        completion.when_complete(move |_| {
            first_counter.fetch_add(1, Ordering::SeqCst);
        });
        completion.when_complete(move |_| {
            second_counter.fetch_add(1, Ordering::SeqCst);
        });
        completion.complete().unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_async_continuation_runs_on_bound_executor() {
        let executor =
            SerialExecutor::spawn("treasury-test-bound".to_string(), None, "Bound").unwrap();
        let completion = Completion::bound_to(executor);
        assert_eq!(completion.executor_name(), Some("treasury-test-bound"));

        let (seen_tx, seen_rx) = std::sync::mpsc::channel();
        completion.when_complete_async(move |errors| {
            let name = thread::current().name().map(str::to_string);
            let _ = seen_tx.send((name, errors.to_vec()));
        });
        completion.complete_exceptionally(boom(5)).unwrap();

        let (name, errors) = seen_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("treasury-test-bound"));
        assert_eq!(errors, vec![boom(5)]);
    }

    #[test]
    fn test_async_continuation_without_executor_runs_inline() {
        let completion = Completion::completed();
        assert_eq!(completion.executor_name(), None);

        let caller = thread::current().id();
        let (seen_tx, seen_rx) = std::sync::mpsc::channel();
        completion.when_complete_async(move |_| {
            let _ = seen_tx.send(thread::current().id());
        });

        assert_eq!(seen_rx.try_recv().unwrap(), caller);
    }

    #[tokio::test]
    async fn test_completion_is_awaitable() {
        let completion = Completion::new();
        let settler = completion.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            settler.complete_exceptionally(boom(4)).unwrap();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(5), completion)
            .await
            .expect("completion should settle");
        assert_eq!(outcome, Err(vec![boom(4)]));
    }

    #[test]
    fn test_debug_output() {
        let completion = Completion::new();
        assert!(format!("{completion:?}").contains("pending"));
        completion.complete().unwrap();
        assert!(format!("{completion:?}").contains("completed"));
    }
}
