use crate::config::LedgerConfig;
use crate::core::{BalanceCalculator, Blockchain, NftLedger, TransactionLedger};
use crate::error::Result;
use crate::storage::{KeyedLocks, LedgerStore};
use crate::wallet::{KeyContext, Wallets};
use log::info;
use std::fs;
use std::sync::Arc;

const STORE_DIR: &str = "ledger";

/// Entry point: one opened store plus the services working on it.
/// Cloning is cheap and clones share the store, keys and locks.
#[derive(Clone)]
pub struct Ledger {
    config: LedgerConfig,
    store: LedgerStore,
    keys: Arc<KeyContext>,
    locks: KeyedLocks,
}

impl Ledger {
    pub fn open(config: LedgerConfig) -> Result<Ledger> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        let store = LedgerStore::open(&config.data_dir.join(STORE_DIR))?;
        info!(
            "Ledger opened at {} (curve: {}, difficulty: {})",
            store.get_path().display(),
            config.curve,
            config.mining.difficulty
        );
        Ok(Ledger {
            keys: Arc::new(KeyContext::new(config.curve)),
            locks: KeyedLocks::new(),
            store,
            config,
        })
    }

    pub fn get_config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyContext {
        &self.keys
    }

    pub fn wallets(&self) -> Wallets {
        Wallets::new(self.store.clone(), self.keys.clone(), self.locks.clone())
    }

    pub fn balances(&self) -> BalanceCalculator {
        BalanceCalculator::new(self.store.clone())
    }

    pub fn transactions(&self) -> TransactionLedger {
        TransactionLedger::new(self.store.clone(), self.keys.clone(), self.locks.clone())
    }

    pub fn blockchain(&self) -> Blockchain {
        Blockchain::new(
            self.store.clone(),
            self.keys.clone(),
            self.config.mining.clone(),
        )
    }

    pub fn nfts(&self) -> NftLedger {
        NftLedger::new(self.store.clone(), self.keys.clone(), self.locks.clone())
    }

    /// Writes buffered changes to disk
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reopen_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig::with_data_dir(dir.path());

        let created = {
            let ledger = Ledger::open(config.clone()).unwrap();
            let created = ledger.wallets().create_wallet("user-1").unwrap();
            ledger.flush().unwrap();
            created
        };

        let reopened = Ledger::open(config).unwrap();
        let wallet = reopened.wallets().get_by_id(&created.id).unwrap();
        assert_eq!(wallet.wallet.get_address(), created.address);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LedgerConfig::with_data_dir(dir.path());
        config.mining.max_transactions_per_block = 0;
        assert!(Ledger::open(config).is_err());
    }
}
