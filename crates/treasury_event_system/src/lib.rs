//! # Treasury Event System
//!
//! A typed, in-process publish/subscribe bus for the Treasury economy API.
//!
//! ## Key Features
//!
//! - **Typed events**: any `Send + Sync + 'static` type is an event once it implements [`Event`]
//! - **Supertype delivery**: events declare the trait objects they can also be seen as, and
//!   subscribers of those supertypes receive the same instance
//! - **Priorities**: subscribers run from [`EventPriority::Highest`] down to
//!   [`EventPriority::Lowest`], with [`EventPriority::Monitor`] observers last
//! - **Per-type executors**: each event type is dispatched sequentially on its own named thread
//! - **One-shot completions**: every fire returns a [`Completion`] carrying the causes of all
//!   failed subscribers, which can be waited on, polled, awaited or observed with a continuation
//!
//! ## Architecture
//!
//! - **EventBus**: registry of event types, entry point for subscribing and firing
//! - **EventSubscriber**: a handler plus its priority, built with a fluent builder
//! - **EventTypeTracker**: walks and caches the supertype hierarchy of fired events
//! - **Completion**: settable-once result shared between the bus and observers
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::time::Duration;
//! use treasury_event_system::{Event, EventBus, EventError, EventPriority, Supertype};
//!
//! pub trait Cancellable: Send + Sync {
//!     fn cancel(&self);
//!     fn is_cancelled(&self) -> bool;
//! }
//!
//! impl Event for dyn Cancellable {}
//!
//! #[derive(Default)]
//! pub struct WithdrawalEvent {
//!     pub amount: u64,
//!     cancelled: AtomicBool,
//! }
//!
//! impl Cancellable for WithdrawalEvent {
//!     fn cancel(&self) {
//!         self.cancelled.store(true, Ordering::SeqCst);
//!     }
//!     fn is_cancelled(&self) -> bool {
//!         self.cancelled.load(Ordering::SeqCst)
//!     }
//! }
//!
//! impl Event for WithdrawalEvent {
//!     fn supertypes() -> Vec<Supertype<Self>> {
//!         vec![Supertype::of(|event: Arc<WithdrawalEvent>| event as Arc<dyn Cancellable>)]
//!     }
//! }
//!
//! let bus = EventBus::new();
//!
//! bus.subscribe(
//!     bus.subscription_for::<WithdrawalEvent>()
//!         .with_priority(EventPriority::High)
//!         .when_called(|event| {
//!             if event.amount > 1_000 {
//!                 event.cancel();
//!             }
//!             Ok(())
//!         })
//!         .complete_subscription()?,
//! )?;
//!
//! bus.subscribe(
//!     bus.subscription_for::<dyn Cancellable>()
//!         .with_priority(EventPriority::Monitor)
//!         .when_called(|event| {
//!             println!("cancelled: {}", event.is_cancelled());
//!             Ok(())
//!         })
//!         .complete_subscription()?,
//! )?;
//!
//! let event = Arc::new(WithdrawalEvent { amount: 5_000, ..Default::default() });
//! let completion = bus.fire_shared(Arc::clone(&event));
//! assert!(completion.wait_timeout(Duration::from_secs(5)));
//! assert!(event.is_cancelled());
//! # Ok::<(), EventError>(())
//! ```

mod bus;
mod caller;
mod completion;
mod config;
mod error;
mod event;
mod executor;
mod priority;
mod stats;
mod subscriber;
mod tracker;


pub use bus::EventBus;
pub use completion::Completion;
pub use config::{EventBusConfig, MIN_THREAD_STACK_SIZE};
pub use error::EventError;
pub use event::{Event, EventType, Supertype};
pub use priority::EventPriority;
pub use stats::EventBusStats;
pub use subscriber::{AsyncHandler, EventSubscriber, EventSubscriberBuilder, Handler, SyncHandler};
pub use tracker::EventTypeTracker;
