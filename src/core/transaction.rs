// Ledger entries - every movement of value or NFT ownership is one of these
// A transaction starts pending and is settled (completed) by exactly one sealed block,
// or canceled by its sender before that happens

use crate::core::{Block, Nft};
use crate::error::Result;
use crate::utils::sha256_hex;
use crate::wallet::KeyContext;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Transfer,
    Minting,
    NftTransfer,
    BlockReward,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Canceled,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Transfer => write!(f, "transfer"),
            TransactionKind::Minting => write!(f, "minting"),
            TransactionKind::NftTransfer => write!(f, "nft_transfer"),
            TransactionKind::BlockReward => write!(f, "block_reward"),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Canceled => write!(f, "canceled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub(crate) id: String,
    // Store-assigned insertion sequence, orders the pending queue
    #[serde(skip)]
    pub(crate) seq: u64,
    #[serde(rename = "type")]
    pub(crate) kind: TransactionKind,
    pub(crate) status: TransactionStatus,
    pub(crate) amount: u64,
    pub(crate) from_address: Option<String>,
    pub(crate) to_address: String,
    pub(crate) signature: Option<String>,
    pub(crate) timestamp: i64,
    pub(crate) block_id: Option<String>,
    pub(crate) nft_id: Option<String>,
}

/// The immutable part of a transaction that goes into a block hash.
/// Status and block link change on settlement and are left out.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashView<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: TransactionKind,
    amount: u64,
    from_address: Option<&'a str>,
    to_address: &'a str,
    signature: Option<&'a str>,
    timestamp: i64,
    nft_id: Option<&'a str>,
}

impl Transaction {
    /// A pending entry with a fresh id. Signature and links are added by the caller.
    pub(crate) fn new_pending(
        seq: u64,
        kind: TransactionKind,
        amount: u64,
        from_address: Option<String>,
        to_address: String,
        timestamp: i64,
    ) -> Transaction {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            seq,
            kind,
            status: TransactionStatus::Pending,
            amount,
            from_address,
            to_address,
            signature: None,
            timestamp,
            block_id: None,
            nft_id: None,
        }
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn get_status(&self) -> TransactionStatus {
        self.status
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_from_address(&self) -> Option<&str> {
        self.from_address.as_deref()
    }

    pub fn get_to_address(&self) -> &str {
        &self.to_address
    }

    pub fn get_signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_block_id(&self) -> Option<&str> {
        self.block_id.as_deref()
    }

    pub fn get_nft_id(&self) -> Option<&str> {
        self.nft_id.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// The message a sender signs: a SHA-256 digest over sender, recipient,
    /// amount, timestamp and the linked NFT if any
    pub fn signing_payload(&self) -> Vec<u8> {
        let from = self.from_address.as_deref().unwrap_or_default();
        let nft = self.nft_id.as_deref().unwrap_or_default();
        let message = format!(
            "{from}{}{}{}{nft}",
            self.to_address, self.amount, self.timestamp
        );
        sha256_hex(message.as_bytes()).into_bytes()
    }

    pub(crate) fn sign_with(&mut self, keys: &KeyContext, private_key: &str) -> Result<()> {
        let signature = keys.sign(private_key, &self.signing_payload())?;
        self.signature = Some(signature);
        Ok(())
    }

    /// True when the transaction carries a signature made by its sender
    pub fn verify_signature(&self, keys: &KeyContext) -> bool {
        match (&self.from_address, &self.signature) {
            (Some(from), Some(signature)) => keys.verify(from, &self.signing_payload(), signature),
            _ => false,
        }
    }

    fn hash_view(&self) -> HashView<'_> {
        HashView {
            id: &self.id,
            kind: self.kind,
            amount: self.amount,
            from_address: self.from_address.as_deref(),
            to_address: &self.to_address,
            signature: self.signature.as_deref(),
            timestamp: self.timestamp,
            nft_id: self.nft_id.as_deref(),
        }
    }
}

/// JSON encoding of a transaction set as it enters the proof-of-work hash
pub fn serialize_for_hash(transactions: &[Transaction]) -> Result<String> {
    let views: Vec<HashView<'_>> = transactions.iter().map(Transaction::hash_view).collect();
    Ok(serde_json::to_string(&views)?)
}

/// A transfer request: who pays whom how much
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_address: String,
    pub to_address: String,
    pub amount: u64,
}

/// Caller-facing projection without block or NFT linkage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: u64,
    pub from_address: Option<String>,
    pub to_address: String,
    pub signature: Option<String>,
    pub timestamp: i64,
}

impl From<&Transaction> for PublicTransaction {
    fn from(tx: &Transaction) -> Self {
        PublicTransaction {
            id: tx.id.clone(),
            kind: tx.kind,
            status: tx.status,
            amount: tx.amount,
            from_address: tx.from_address.clone(),
            to_address: tx.to_address.clone(),
            signature: tx.signature.clone(),
            timestamp: tx.timestamp,
        }
    }
}

/// A transaction together with the block that settled it and its NFT
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub transaction: Transaction,
    pub block: Option<Block>,
    pub nft: Option<Nft>,
}
