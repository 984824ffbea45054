//! Wallet management and cryptographic operations
//!
//! Key generation, address derivation, signing and the wallet registry.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{Curve, GeneratedKeyPair, KeyContext, PrivateKey, Wallet};
pub use wallets::{CreatedWallet, WalletWithBalance, Wallets};
