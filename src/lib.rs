//! # Ledger Chain
//!
//! A single-node ledger: wallets with ECDSA keys, value transfers that are
//! admitted against settled balances, a proof-of-work sealer that settles them
//! into hash-chained blocks, and NFTs whose ownership moves through the same
//! ledger.
//!
//! ## How the code is organized
//! - `core/`: records (transactions, blocks, NFTs) and the services that change them
//! - `wallet/`: key model and the wallet registry
//! - `storage/`: the Sled-backed ledger store and per-key locks
//! - `config/`: ledger configuration (TOML file plus environment overrides)
//! - `error/`: the crate error type and its caller-facing kinds
//! - `utils/`: hashing, hex and record encoding helpers
//! - `cli/`: command-line interface
//!
//! ## Where to start
//! 1. [`Ledger::open`] wires the store to the services
//! 2. `core/transaction_ledger.rs` admits transfers
//! 3. `core/blockchain.rs` seals them into blocks
//! 4. `core/nft_ledger.rs` layers NFTs on top

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod ledger;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{LedgerConfig, MiningConfig};
pub use core::{
    BalanceCalculator, Block, BlockWithTransactions, Blockchain, CancelToken, ChainReport, Nft,
    NftDetails, NftLedger, ProofOfWork, PublicTransaction, SealedBlock, Transaction,
    TransactionDetails, TransactionKind, TransactionLedger, TransactionStatus, TransferRequest,
};
pub use error::{ErrorKind, LedgerError, Result};
pub use ledger::Ledger;
pub use wallet::{CreatedWallet, Curve, KeyContext, Wallet, Wallets};
