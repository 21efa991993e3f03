//! # Economy events
//!
//! The event hierarchy economy providers fire on the [`EventBus`]:
//!
//! ```text
//! AccountTransactionEvent ──> dyn AccountEvent ──> dyn EconomyEvent
//!                        └──> dyn Cancellable
//! ```
//!
//! Subscribing to `dyn AccountEvent` receives every account event, whatever its concrete type;
//! subscribing to `AccountTransactionEvent` receives transactions only.
//!
//! Providers announce a transaction *before* applying it. Subscribers may veto it by marking the
//! event cancelled; later subscribers (and the provider) observe the flag.

use crate::transaction::{AccountId, Transaction};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use treasury_event_system::{Event, EventBus, EventError, Supertype};

/// Common supertype of every economy event.
pub trait EconomyEvent: Send + Sync {
    /// One-line human readable summary, used in logs.
    fn describe(&self) -> String;
}

/// An economy event concerning a single account.
pub trait AccountEvent: EconomyEvent {
    /// The account the event is about.
    fn account_id(&self) -> &AccountId;
}

/// An event whose outcome subscribers can veto.
pub trait Cancellable: Send + Sync {
    fn is_cancelled(&self) -> bool;

    fn set_cancelled(&self, cancelled: bool);
}

impl Event for dyn EconomyEvent {}

impl Event for dyn AccountEvent {
    fn supertypes() -> Vec<Supertype<Self>> {
        vec![Supertype::of(|event: Arc<dyn AccountEvent>| {
            event as Arc<dyn EconomyEvent>
        })]
    }
}

impl Event for dyn Cancellable {}

/// Fired before a transaction is applied to an account.
#[derive(Debug)]
pub struct AccountTransactionEvent {
    account_id: AccountId,
    transaction: Transaction,
    cancelled: AtomicBool,
}

impl AccountTransactionEvent {
    pub fn new(account_id: AccountId, transaction: Transaction) -> Self {
        Self {
            account_id,
            transaction,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }
}

impl EconomyEvent for AccountTransactionEvent {
    fn describe(&self) -> String {
        let transaction = &self.transaction;
        format!(
            "{:?} of {} {} on {}",
            transaction.kind, transaction.amount, transaction.currency_id, self.account_id
        )
    }
}

impl AccountEvent for AccountTransactionEvent {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }
}

impl Cancellable for AccountTransactionEvent {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn set_cancelled(&self, cancelled: bool) {
        self.cancelled.store(cancelled, Ordering::SeqCst);
    }
}

impl Event for AccountTransactionEvent {
    fn supertypes() -> Vec<Supertype<Self>> {
        vec![
            Supertype::of(|event: Arc<AccountTransactionEvent>| event as Arc<dyn AccountEvent>),
            Supertype::of(|event: Arc<AccountTransactionEvent>| event as Arc<dyn Cancellable>),
        ]
    }
}

/// What the subscribers of an announced transaction decided.
#[derive(Debug)]
pub struct TransactionOutcome {
    /// The event as the subscribers left it
    pub event: Arc<AccountTransactionEvent>,
    /// Failures reported by subscribers, in dispatch order
    pub errors: Vec<EventError>,
}

impl TransactionOutcome {
    /// Whether a subscriber vetoed the transaction.
    pub fn is_cancelled(&self) -> bool {
        self.event.is_cancelled()
    }

    /// Whether the transaction may be applied: not cancelled and no subscriber failed.
    pub fn is_approved(&self) -> bool {
        !self.is_cancelled() && self.errors.is_empty()
    }
}

/// Fires an [`AccountTransactionEvent`] and waits for every subscriber to finish.
///
/// This is the provider side of the bus: announce, wait, then apply the transaction only if
/// [`TransactionOutcome::is_approved`].
pub async fn announce_transaction(
    bus: &EventBus,
    account_id: AccountId,
    transaction: Transaction,
) -> TransactionOutcome {
    let event = Arc::new(AccountTransactionEvent::new(account_id, transaction));
    debug!("📣 Announcing {}", event.describe());

    let errors = bus
        .fire_shared(Arc::clone(&event))
        .await
        .err()
        .unwrap_or_default();

    TransactionOutcome { event, errors }
}
