use crate::core::Transaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub(crate) id: String,
    pub(crate) index: u64,
    pub(crate) timestamp: i64,
    pub(crate) previous_hash: String,
    pub(crate) hash: String,
    pub(crate) nonce: u64,
    // Difficulty the block was sealed at
    pub(crate) difficulty: u32,
    // Settled transactions in hashing order
    pub(crate) transaction_ids: Vec<String>,
}

impl Block {
    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn get_hash(&self) -> &str {
        &self.hash
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_transaction_ids(&self) -> &[String] {
        &self.transaction_ids
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}

/// A block with its settled transactions in hashing order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockWithTransactions {
    #[serde(flatten)]
    pub block: Block,
    pub transactions: Vec<Transaction>,
}
