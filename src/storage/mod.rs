//! Data storage and persistence
//!
//! Wallets, transactions, blocks and NFTs live in one Sled database. Multi-record
//! changes are committed through Sled transactions; admission checks that span a
//! read and a write are serialized per key with [`KeyedLocks`].

pub mod ledger_store;
pub mod locks;

pub use ledger_store::{AccountTotals, LedgerStore, SealCommit, TransactionFilter};
pub use locks::KeyedLocks;
