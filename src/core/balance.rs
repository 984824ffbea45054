use crate::core::TransactionStatus;
use crate::error::Result;
use crate::storage::{LedgerStore, TransactionFilter};

/// Derives account balances from the transaction history. Nothing is cached;
/// every call recomputes from the store.
#[derive(Clone)]
pub struct BalanceCalculator {
    store: LedgerStore,
}

impl BalanceCalculator {
    pub fn new(store: LedgerStore) -> BalanceCalculator {
        BalanceCalculator { store }
    }

    /// Completed credits minus completed debits. Pending and canceled
    /// transactions never count. An unknown address has balance 0.
    pub fn calculate_balance(&self, address: &str) -> Result<i128> {
        let credits = self.store.sum_amounts(&TransactionFilter {
            status: Some(TransactionStatus::Completed),
            to_address: Some(address.to_string()),
            ..TransactionFilter::default()
        })?;
        let debits = self.store.sum_amounts(&TransactionFilter {
            status: Some(TransactionStatus::Completed),
            from_address: Some(address.to_string()),
            ..TransactionFilter::default()
        })?;
        Ok(credits as i128 - debits as i128)
    }

    /// What `address` may still commit to new transfers: the settled balance
    /// less everything it has already promised in pending transfers
    pub fn spendable_balance(&self, address: &str) -> Result<i128> {
        let totals = self.store.account_totals(address)?;
        Ok(totals.credits as i128 - totals.debits as i128 - totals.pending_debits as i128)
    }
}

#[cfg(test)]
mod tests {
    use crate::testnet::TestLedger;

    #[test]
    fn test_unknown_address_has_zero_balance() {
        let ledger = TestLedger::new();
        let balances = ledger.ledger.balances();
        assert_eq!(balances.calculate_balance("04ffff").unwrap(), 0);
        assert_eq!(balances.spendable_balance("04ffff").unwrap(), 0);
    }

    #[test]
    fn test_completed_incoming_transfer_counts() {
        let ledger = TestLedger::new();
        let funded = ledger.funded_wallet("alice", 100);
        let balances = ledger.ledger.balances();
        assert_eq!(balances.calculate_balance(&funded.address).unwrap(), 100);
    }

    #[test]
    fn test_pending_transfer_reduces_only_spendable() {
        let ledger = TestLedger::new();
        let alice = ledger.funded_wallet("alice", 100);
        let bob = ledger.wallet("bob");
        ledger.send(&alice, &bob.address, 30);

        let balances = ledger.ledger.balances();
        assert_eq!(balances.calculate_balance(&alice.address).unwrap(), 100);
        assert_eq!(balances.spendable_balance(&alice.address).unwrap(), 70);
        assert_eq!(balances.calculate_balance(&bob.address).unwrap(), 0);
    }

    #[test]
    fn test_settled_transfer_moves_balance() {
        let ledger = TestLedger::new();
        let alice = ledger.funded_wallet("alice", 100);
        let bob = ledger.wallet("bob");
        ledger.send(&alice, &bob.address, 30);
        ledger.mine(&bob.address);

        let balances = ledger.ledger.balances();
        assert_eq!(balances.calculate_balance(&alice.address).unwrap(), 70);
        assert_eq!(balances.calculate_balance(&bob.address).unwrap(), 30);
    }
}
