//! Core ledger functionality
//!
//! This module contains the ledger records (transactions, blocks, NFTs), the
//! balance calculator, the transaction and NFT ledgers, and the proof-of-work
//! block sealer.

pub mod balance;
pub mod block;
pub mod blockchain;
pub mod nft;
pub mod nft_ledger;
pub mod proof_of_work;
pub mod transaction;
pub mod transaction_ledger;

pub use balance::BalanceCalculator;
pub use block::{Block, BlockWithTransactions};
pub use blockchain::{Blockchain, ChainFault, ChainReport, SealedBlock};
pub use nft::{Nft, NftDetails};
pub use nft_ledger::NftLedger;
pub use proof_of_work::{CancelToken, MiningBudget, PowOutcome, ProofOfWork};
pub use transaction::{
    PublicTransaction, Transaction, TransactionDetails, TransactionKind, TransactionStatus,
    TransferRequest,
};
pub use transaction_ledger::TransactionLedger;
