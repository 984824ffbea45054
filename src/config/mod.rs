//! Configuration management
//!
//! This module holds the tunable parameters of the ledger: where the store
//! lives, which elliptic curve keys use, and how blocks are sealed.
//! Configuration is passed explicitly into [`crate::Ledger::open`].

pub mod settings;

pub use settings::{LedgerConfig, MiningConfig};
