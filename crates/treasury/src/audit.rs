//! Transaction audit trail.
//!
//! The auditor subscribes to [`AccountTransactionEvent`] and writes one JSON line per
//! announced transaction to the `treasury::audit` log target.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use treasury_api::{
    AccountEvent, AccountId, AccountTransactionEvent, Cancellable, EventBus, EventError,
    EventPriority, Transaction,
};

/// Counters kept by the [`TransactionAuditor`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    /// Transactions seen
    pub audited: u64,
    /// Transactions that were cancelled by the time the auditor saw them
    pub cancelled: u64,
}

#[derive(Serialize)]
struct AuditEntry<'a> {
    account: &'a AccountId,
    transaction: &'a Transaction,
    cancelled: bool,
}

/// Logs every announced transaction and counts them.
#[derive(Debug, Default)]
pub struct TransactionAuditor {
    audited: AtomicU64,
    cancelled: AtomicU64,
}

impl TransactionAuditor {
    /// Subscribes a new auditor to `bus` at `priority`.
    ///
    /// At [`EventPriority::Monitor`] the auditor records the final cancelled state of each
    /// transaction; at any other priority it records the state as of its turn.
    pub fn install(bus: &EventBus, priority: EventPriority) -> Result<Arc<Self>, EventError> {
        let auditor = Arc::new(Self::default());
        let recorder = Arc::clone(&auditor);

        bus.subscribe(
            bus.subscription_for::<AccountTransactionEvent>()
                .with_priority(priority)
                .named("transaction-auditor")
                .when_called(move |event| {
                    recorder.record(&event);
                    Ok(())
                })
                .complete_subscription()?,
        )?;

        info!("🧾 Transaction auditor installed at {} priority", priority);
        Ok(auditor)
    }

    fn record(&self, event: &AccountTransactionEvent) {
        let cancelled = event.is_cancelled();
        self.audited.fetch_add(1, Ordering::Relaxed);
        if cancelled {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        }

        let entry = AuditEntry {
            account: event.account_id(),
            transaction: event.transaction(),
            cancelled,
        };
        match serde_json::to_string(&entry) {
            Ok(line) => info!(target: "treasury::audit", "{}", line),
            Err(e) => warn!("⚠️ Failed to serialize audit entry: {}", e),
        }
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            audited: self.audited.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}
