//! # Accounts and transactions
//!
//! The value types economy events carry. Amounts are integers in the currency's minor unit
//! (cents, for a currency with two decimal places), so no rounding ever happens in transit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Returns the current Unix timestamp in seconds.
///
/// A clock set before the epoch reads as `0` rather than failing.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Identifies an economy account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AccountId {
    /// The personal account of a player
    Player(Uuid),
    /// A shared or plugin-owned account (a bank, a town, a shop...)
    NonPlayer(String),
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountId::Player(uuid) => write!(f, "player:{}", uuid),
            AccountId::NonPlayer(id) => write!(f, "account:{}", id),
        }
    }
}

/// Direction of a transaction, seen from the account it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

/// Who asked for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TransactionInitiator {
    /// The server itself (console, scheduled tasks)
    Server,
    /// A player, through a command or an in-game action
    Player(Uuid),
    /// Another plugin, by name
    Plugin(String),
}

/// An economic action against one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique id of this transaction
    pub id: Uuid,
    /// Deposit or withdrawal
    pub kind: TransactionKind,
    /// Amount in the currency's minor unit
    pub amount: u64,
    /// Identifier of the currency the amount is expressed in
    pub currency_id: String,
    /// Who requested the transaction
    pub initiator: TransactionInitiator,
    /// Free-form reason, shown in logs and statements
    pub reason: Option<String>,
    /// Unix timestamp (seconds) the transaction was created at
    pub timestamp: u64,
}

impl Transaction {
    /// Creates a deposit of `amount` minor units of `currency_id`, initiated by the server.
    pub fn deposit(amount: u64, currency_id: impl Into<String>) -> Self {
        Self::new(TransactionKind::Deposit, amount, currency_id)
    }

    /// Creates a withdrawal of `amount` minor units of `currency_id`, initiated by the server.
    pub fn withdrawal(amount: u64, currency_id: impl Into<String>) -> Self {
        Self::new(TransactionKind::Withdrawal, amount, currency_id)
    }

    fn new(kind: TransactionKind, amount: u64, currency_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            amount,
            currency_id: currency_id.into(),
            initiator: TransactionInitiator::Server,
            reason: None,
            timestamp: current_timestamp(),
        }
    }

    /// Sets who initiated the transaction.
    pub fn initiated_by(mut self, initiator: TransactionInitiator) -> Self {
        self.initiator = initiator;
        self
    }

    /// Sets the reason of the transaction.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Change this transaction applies to a balance, in minor units.
    pub fn signed_amount(&self) -> i128 {
        match self.kind {
            TransactionKind::Deposit => i128::from(self.amount),
            TransactionKind::Withdrawal => -i128::from(self.amount),
        }
    }
}
