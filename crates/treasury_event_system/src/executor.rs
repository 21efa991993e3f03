//! Dedicated single-threaded executors, one per event type

use crate::error::EventError;
use crossbeam::channel::{self, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;
use tracing::{debug, error, trace};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted jobs one at a time, in submission order, on a named thread.
///
/// Clones submit to the same thread. The thread exits once every clone is dropped and the
/// queue has drained.
#[derive(Clone)]
pub(crate) struct SerialExecutor {
    name: String,
    event_type: &'static str,
    sender: Sender<Job>,
}

impl SerialExecutor {
    pub(crate) fn spawn(
        name: String,
        stack_size: Option<usize>,
        event_type: &'static str,
    ) -> Result<Self, EventError> {
        let (sender, receiver) = channel::unbounded::<Job>();

        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(stack_size) = stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread_name = name.clone();
        builder
            .spawn(move || {
                debug!(executor = %thread_name, "event executor started");
                run_jobs(&thread_name, receiver);
                debug!(executor = %thread_name, "event executor exiting");
            })
            .map_err(|e| EventError::ExecutorUnavailable {
                event_type,
                reason: e.to_string(),
            })?;

        Ok(Self {
            name,
            event_type,
            sender,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Queues `job` behind everything already submitted.
    pub(crate) fn execute(&self, job: Job) -> Result<(), EventError> {
        self.sender.send(job).map_err(|_| EventError::ExecutorUnavailable {
            event_type: self.event_type,
            reason: format!("executor {} has stopped", self.name),
        })
    }
}

fn run_jobs(name: &str, receiver: Receiver<Job>) {
    for job in receiver {
        trace!(executor = %name, "running job");
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            let message = payload
                .downcast_ref::<&'static str>()
                .map(|message| (*message).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!("💥 Job on event executor {} panicked: {}", name, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_order_on_named_thread() {
        let executor = SerialExecutor::spawn("treasury-test-order".to_string(), None, "Order")
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = channel::bounded(1);

        for index in 0..5 {
            let seen = Arc::clone(&seen);
            executor
                .execute(Box::new(move || {
                    let name = thread::current().name().map(str::to_string);
                    seen.lock().unwrap().push((index, name));
                }))
                .unwrap();
        }
        executor
            .execute(Box::new(move || {
                let _ = done_tx.send(());
            }))
            .unwrap();

        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let seen = seen.lock().unwrap();
        let order: Vec<_> = seen.iter().map(|(index, _)| *index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert!(seen
            .iter()
            .all(|(_, name)| name.as_deref() == Some("treasury-test-order")));
        assert_eq!(executor.name(), "treasury-test-order");
    }

    #[test]
    fn test_panicking_job_does_not_stop_executor() {
        let executor =
            SerialExecutor::spawn("treasury-test-panic".to_string(), Some(256 * 1024), "Panic")
                .unwrap();
        let (done_tx, done_rx) = channel::bounded(1);

        executor.execute(Box::new(|| panic!("bad job"))).unwrap();
        executor
            .execute(Box::new(move || {
                let _ = done_tx.send("still running");
            }))
            .unwrap();

        assert_eq!(
            done_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            "still running"
        );
    }
}
