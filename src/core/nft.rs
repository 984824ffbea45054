use crate::core::Transaction;
use crate::error::Result;
use crate::wallet::Wallet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
#[serde(rename_all = "camelCase")]
pub struct Nft {
    pub(crate) id: String,
    // JSON text, validated when minted
    pub(crate) metadata: String,
    pub(crate) burned: bool,
    pub(crate) owner_id: Option<String>,
    pub(crate) creator_id: String,
    // Id of the nft_transfer waiting for settlement, at most one
    pub(crate) pending_transfer: Option<String>,
    pub(crate) created_at: i64,
}

impl Nft {
    pub(crate) fn new(metadata: String, creator_id: &str, created_at: i64) -> Nft {
        Nft {
            id: uuid::Uuid::new_v4().to_string(),
            metadata,
            burned: false,
            owner_id: Some(creator_id.to_string()),
            creator_id: creator_id.to_string(),
            pending_transfer: None,
            created_at,
        }
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_metadata(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.metadata)?)
    }

    pub fn is_burned(&self) -> bool {
        self.burned
    }

    pub fn get_owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn get_creator_id(&self) -> &str {
        &self.creator_id
    }

    pub fn get_pending_transfer(&self) -> Option<&str> {
        self.pending_transfer.as_deref()
    }

    pub fn get_created_at(&self) -> i64 {
        self.created_at
    }
}

/// An NFT with its ledger history and the wallets it points at
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NftDetails {
    pub nft: Nft,
    pub transactions: Vec<Transaction>,
    pub owner: Option<Wallet>,
    pub creator: Option<Wallet>,
}
