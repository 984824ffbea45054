//! Test fixtures
//!
//! Isolated ledgers in temporary directories with a funded bank wallet.

pub mod test_utils;

pub use test_utils::*;
