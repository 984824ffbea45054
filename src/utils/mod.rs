//! Utility functions and helpers
//!
//! Hashing, hex encoding, timestamps and the record codec used by the store.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, hex_decode, hex_encode, leading_zero_digits, sha256_digest, sha256_hex,
};

pub use serialization::{deserialize, serialize};
