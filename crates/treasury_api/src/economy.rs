//! The economy provider contract

/// Implemented by the plugin that owns the server's economy.
///
/// The account and currency model behind a provider is its own business; Treasury only
/// needs to find the provider (through the [`ServiceRegistry`](crate::ServiceRegistry)) and
/// know which optional behaviours it offers.
pub trait EconomyProvider: Send + Sync {
    /// Display name of the provider.
    fn name(&self) -> &str;

    /// Identifier of the currency used when a caller does not name one.
    fn primary_currency_id(&self) -> &str;

    /// Whether balances may go below zero.
    fn supports_negative_balances(&self) -> bool {
        false
    }

    /// Whether the provider announces transactions through
    /// [`announce_transaction`](crate::announce_transaction) before applying them.
    fn supports_transaction_events(&self) -> bool {
        true
    }
}
