//! # Treasury API
//!
//! The economy-facing half of Treasury, built on [`treasury_event_system`]:
//!
//! - **Economy events**: [`AccountTransactionEvent`] and the trait hierarchy it can be observed
//!   through ([`AccountEvent`], [`EconomyEvent`], [`Cancellable`])
//! - **Transactions**: [`Transaction`] and [`AccountId`], serialisable value types
//! - **Providers**: the [`EconomyProvider`] contract economy plugins implement
//! - **Services**: the [`ServiceRegistry`] through which providers are published and found
//!
//! ```rust
//! use std::sync::Arc;
//! use treasury_api::{
//!     announce_transaction, AccountId, AccountTransactionEvent, Cancellable, EventBus,
//!     EventPriority, Transaction,
//! };
//!
//! # async fn run() -> Result<(), treasury_api::EventError> {
//! let bus = Arc::new(EventBus::new());
//!
//! bus.subscribe(
//!     bus.subscription_for::<AccountTransactionEvent>()
//!         .with_priority(EventPriority::High)
//!         .when_called(|event| {
//!             if event.transaction().amount > 10_000 {
//!                 event.set_cancelled(true);
//!             }
//!             Ok(())
//!         })
//!         .complete_subscription()?,
//! )?;
//!
//! let account = AccountId::NonPlayer("town-bank".to_string());
//! let outcome = announce_transaction(&bus, account, Transaction::withdrawal(50_000, "coins")).await;
//! assert!(outcome.is_cancelled());
//! # Ok(())
//! # }
//! ```

mod economy;
mod events;
mod service;
mod transaction;

pub use economy::EconomyProvider;
pub use events::{
    announce_transaction, AccountEvent, AccountTransactionEvent, Cancellable, EconomyEvent,
    TransactionOutcome,
};
pub use service::{Service, ServiceError, ServicePriority, ServiceRegistry};
pub use transaction::{
    current_timestamp, AccountId, Transaction, TransactionInitiator, TransactionKind,
};

pub use treasury_event_system::{
    Completion, Event, EventBus, EventBusConfig, EventError, EventPriority, EventSubscriber,
    Supertype,
};
