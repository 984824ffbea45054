// Durable state of the ledger, kept in Sled trees
// Every multi-record mutation runs inside one Sled transaction spanning the trees it touches,
// so a reader sees either all of a commit or none of it

use crate::core::{Block, Nft, Transaction, TransactionKind, TransactionStatus};
use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, TransactionResult,
    TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use std::path::{Path, PathBuf};

const WALLETS_TREE: &str = "wallets"; // wallet id -> Wallet
const WALLET_ADDRESSES_TREE: &str = "wallet_addresses"; // address -> wallet id
const TRANSACTIONS_TREE: &str = "transactions"; // transaction id -> Transaction
const PENDING_TREE: &str = "pending_transactions"; // seq (big endian) -> transaction id
const BLOCKS_TREE: &str = "blocks"; // block id -> Block
const BLOCK_INDEX_TREE: &str = "block_index"; // index (big endian) -> block id
const NFTS_TREE: &str = "nfts"; // nft id -> Nft

/// Equality predicates for transaction scans. `None` matches anything.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub kind: Option<TransactionKind>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub nft_id: Option<String>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.status.map_or(true, |s| tx.status == s)
            && self.kind.map_or(true, |k| tx.kind == k)
            && self
                .from_address
                .as_deref()
                .map_or(true, |a| tx.from_address.as_deref() == Some(a))
            && self
                .to_address
                .as_deref()
                .map_or(true, |a| tx.to_address == a)
            && self
                .nft_id
                .as_deref()
                .map_or(true, |n| tx.nft_id.as_deref() == Some(n))
    }
}

/// Per-address sums gathered in one pass over the transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountTotals {
    pub credits: u128,
    pub debits: u128,
    pub pending_debits: u128,
}

/// Everything a sealed block changes, committed as a unit
pub struct SealCommit<'a> {
    pub block: &'a Block,
    pub settled_ids: &'a [String],
    pub reward: &'a Transaction,
}

#[derive(Clone)]
pub struct LedgerStore {
    db: Db,
    path: PathBuf,
    wallets: Tree,
    wallet_addresses: Tree,
    transactions: Tree,
    pending: Tree,
    blocks: Tree,
    block_index: Tree,
    nfts: Tree,
}

impl LedgerStore {
    pub fn open(path: &Path) -> Result<LedgerStore> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::internal(format!("Failed to open database: {e}")))?;
        let store = LedgerStore {
            path: path.to_path_buf(),
            wallets: db.open_tree(WALLETS_TREE)?,
            wallet_addresses: db.open_tree(WALLET_ADDRESSES_TREE)?,
            transactions: db.open_tree(TRANSACTIONS_TREE)?,
            pending: db.open_tree(PENDING_TREE)?,
            blocks: db.open_tree(BLOCKS_TREE)?,
            block_index: db.open_tree(BLOCK_INDEX_TREE)?,
            nfts: db.open_tree(NFTS_TREE)?,
            db,
        };
        Ok(store)
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    /// Monotonic sequence used to order pending transactions
    pub fn next_sequence(&self) -> Result<u64> {
        Ok(self.db.generate_id()?)
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // ---- wallets ----

    pub fn insert_wallet(&self, wallet: &Wallet) -> Result<()> {
        let bytes = serialize(wallet)?;
        let result: TransactionResult<(), LedgerError> = (&self.wallets, &self.wallet_addresses)
            .transaction(|(wallets, addresses)| {
                if addresses.get(wallet.address.as_str())?.is_some() {
                    return abort(LedgerError::Conflict(
                        "A wallet with this address already exists.".to_string(),
                    ));
                }
                wallets.insert(wallet.id.as_str(), bytes.as_slice())?;
                addresses.insert(wallet.address.as_str(), wallet.id.as_str())?;
                Ok(())
            });
        Ok(result?)
    }

    pub fn get_wallet(&self, id: &str) -> Result<Option<Wallet>> {
        self.wallets
            .get(id)?
            .map(|bytes| deserialize(&bytes))
            .transpose()
    }

    pub fn find_wallet_by_address(&self, address: &str) -> Result<Option<Wallet>> {
        match self.wallet_addresses.get(address)? {
            Some(id) => self.get_wallet(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn list_wallets(&self) -> Result<Vec<Wallet>> {
        let mut wallets = self.decode_all::<Wallet>(&self.wallets)?;
        wallets.sort_by_key(|w| w.created_at);
        Ok(wallets)
    }

    /// Removes the wallet if it still exists. Returns false when it was already gone.
    pub fn delete_wallet(&self, wallet: &Wallet) -> Result<bool> {
        let result: TransactionResult<bool, LedgerError> = (&self.wallets, &self.wallet_addresses)
            .transaction(|(wallets, addresses)| {
                if wallets.remove(wallet.id.as_str())?.is_none() {
                    return Ok(false);
                }
                addresses.remove(wallet.address.as_str())?;
                Ok(true)
            });
        Ok(result?)
    }

    // ---- transactions ----

    /// Atomically creates the given transactions; pending ones join the queue
    pub fn insert_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        let encoded = encode_all(transactions)?;
        let result: TransactionResult<(), LedgerError> = (&self.transactions, &self.pending)
            .transaction(|(txs, pending)| {
                for (tx, bytes) in transactions.iter().zip(&encoded) {
                    put_transaction(txs, pending, tx, bytes)?;
                }
                Ok(())
            });
        Ok(result?)
    }

    pub fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        self.transactions
            .get(id)?
            .map(|bytes| deserialize(&bytes))
            .transpose()
    }

    /// All transactions in insertion order
    pub fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.scan_transactions(&TransactionFilter::default(), None)
    }

    /// Filtered scan in insertion order with an optional take-limit
    pub fn scan_transactions(
        &self,
        filter: &TransactionFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        let mut matching: Vec<Transaction> = self
            .decode_all::<Transaction>(&self.transactions)?
            .into_iter()
            .filter(|tx| filter.matches(tx))
            .collect();
        matching.sort_by_key(|tx| tx.seq);
        if let Some(limit) = limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    /// Aggregate sum of amounts over the matching transactions
    pub fn sum_amounts(&self, filter: &TransactionFilter) -> Result<u128> {
        let mut total: u128 = 0;
        for item in self.transactions.iter() {
            let (_, bytes) = item?;
            let tx: Transaction = deserialize(&bytes)?;
            if filter.matches(&tx) {
                total += u128::from(tx.amount);
            }
        }
        Ok(total)
    }

    /// Settled credits and debits plus pending debits of `address`.
    /// Each transaction is read once, in whichever state it is in at that moment.
    pub fn account_totals(&self, address: &str) -> Result<AccountTotals> {
        let mut totals = AccountTotals::default();
        for item in self.transactions.iter() {
            let (_, bytes) = item?;
            let tx: Transaction = deserialize(&bytes)?;
            let amount = u128::from(tx.amount);
            let outgoing = tx.from_address.as_deref() == Some(address);
            match tx.status {
                TransactionStatus::Completed => {
                    if tx.to_address == address {
                        totals.credits += amount;
                    }
                    if outgoing {
                        totals.debits += amount;
                    }
                }
                TransactionStatus::Pending if outgoing => totals.pending_debits += amount,
                _ => {}
            }
        }
        Ok(totals)
    }

    /// Oldest pending transactions first, at most `limit`
    pub fn pending_transactions(&self, limit: usize) -> Result<Vec<Transaction>> {
        let mut selected = Vec::new();
        for item in self.pending.iter() {
            if selected.len() >= limit {
                break;
            }
            let (_, id) = item?;
            let id = String::from_utf8_lossy(&id).to_string();
            match self.get_transaction(&id)? {
                Some(tx) if tx.is_pending() => selected.push(tx),
                // Settled or canceled between the two reads
                _ => continue,
            }
        }
        Ok(selected)
    }

    /// pending -> canceled, only if the transaction is still pending.
    /// A pending NFT transfer releases its hold on the NFT.
    pub fn cancel_transaction(&self, id: &str) -> Result<Transaction> {
        let result: TransactionResult<Transaction, LedgerError> =
            (&self.transactions, &self.pending, &self.nfts).transaction(|(txs, pending, nfts)| {
                let mut tx: Transaction = match txs.get(id)? {
                    Some(bytes) => decode(&bytes)?,
                    None => {
                        return abort(LedgerError::NotFound(
                            "Transaction not found.".to_string(),
                        ))
                    }
                };
                if !tx.is_pending() {
                    return abort(LedgerError::Conflict(format!(
                        "Transaction is {} and cannot be canceled.",
                        tx.status
                    )));
                }
                // An NFT never outlives its minting record
                if tx.kind == TransactionKind::Minting {
                    return abort(LedgerError::Conflict(
                        "Minting transactions cannot be canceled.".to_string(),
                    ));
                }
                tx.status = TransactionStatus::Canceled;
                txs.insert(id, encode(&tx)?)?;
                pending.remove(seq_key(tx.seq))?;

                if tx.kind == TransactionKind::NftTransfer {
                    if let Some(nft_id) = tx.nft_id.as_deref() {
                        release_nft_hold(nfts, nft_id, &tx.id)?;
                    }
                }
                Ok(tx)
            });
        Ok(result?)
    }

    // ---- blocks ----

    /// Highest-index block
    pub fn tip_block(&self) -> Result<Option<Block>> {
        match self.block_index.last()? {
            Some((_, id)) => self.get_block(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn get_block(&self, id: &str) -> Result<Option<Block>> {
        self.blocks
            .get(id)?
            .map(|bytes| deserialize(&bytes))
            .transpose()
    }

    pub fn get_block_by_index(&self, index: u64) -> Result<Option<Block>> {
        match self.block_index.get(index_key(index))? {
            Some(id) => self.get_block(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    /// All blocks ordered by index
    pub fn list_blocks(&self) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for item in self.block_index.iter() {
            let (_, id) = item?;
            let id = String::from_utf8_lossy(&id).to_string();
            let block = self.get_block(&id)?.ok_or_else(|| {
                LedgerError::internal(format!("Block index points at missing block {id}"))
            })?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    pub fn transactions_of_block(&self, block: &Block) -> Result<Vec<Transaction>> {
        block
            .transaction_ids
            .iter()
            .map(|id| {
                self.get_transaction(id)?.ok_or_else(|| {
                    LedgerError::internal(format!("Block {} links missing transaction {id}", block.id))
                })
            })
            .collect()
    }

    /// Writes block 0 with its settled reward. Fails if any block exists.
    pub fn commit_genesis(&self, block: &Block, reward: &Transaction) -> Result<()> {
        let block_bytes = serialize(block)?;
        let reward_bytes = serialize(reward)?;
        let result: TransactionResult<(), LedgerError> =
            (&self.blocks, &self.block_index, &self.transactions).transaction(
                |(blocks, index, txs)| {
                    if index.get(index_key(0))?.is_some() {
                        return abort(LedgerError::Conflict(
                            "Blockchain already initialized.".to_string(),
                        ));
                    }
                    blocks.insert(block.id.as_str(), block_bytes.as_slice())?;
                    index.insert(index_key(0), block.id.as_str())?;
                    txs.insert(reward.id.as_str(), reward_bytes.as_slice())?;
                    Ok(())
                },
            );
        Ok(result?)
    }

    /// Appends a sealed block and settles its transactions.
    ///
    /// Aborts with `Conflict` when any selected transaction is no longer
    /// pending or when the block's index was taken by a concurrent seal.
    /// Settled NFT transfers move ownership to the recipient's wallet.
    pub fn commit_sealed_block(&self, commit: &SealCommit<'_>) -> Result<Vec<Transaction>> {
        let block = commit.block;
        let block_bytes = serialize(block)?;
        let reward_bytes = serialize(commit.reward)?;
        let result: TransactionResult<Vec<Transaction>, LedgerError> = (
            &self.transactions,
            &self.pending,
            &self.blocks,
            &self.block_index,
            &self.nfts,
            &self.wallet_addresses,
        )
            .transaction(|(txs, pending, blocks, index, nfts, addresses)| {
                if index.get(index_key(block.index))?.is_some() {
                    return abort(LedgerError::Conflict(format!(
                        "Block {} was sealed concurrently.",
                        block.index
                    )));
                }
                if block.index > 0 {
                    let anchored = match index.get(index_key(block.index - 1))? {
                        Some(tip_id) => match blocks.get(tip_id)? {
                            Some(bytes) => decode::<Block>(&bytes)?.hash == block.previous_hash,
                            None => false,
                        },
                        None => false,
                    };
                    if !anchored {
                        return abort(LedgerError::Conflict(
                            "Chain tip moved during sealing.".to_string(),
                        ));
                    }
                }

                let mut settled = Vec::with_capacity(commit.settled_ids.len());
                for id in commit.settled_ids {
                    let mut tx: Transaction = match txs.get(id.as_str())? {
                        Some(bytes) => decode(&bytes)?,
                        None => {
                            return abort(LedgerError::Conflict(format!(
                                "Transaction {id} disappeared during sealing."
                            )))
                        }
                    };
                    if !tx.is_pending() || pending.get(seq_key(tx.seq))?.is_none() {
                        return abort(LedgerError::Conflict(format!(
                            "Transaction {id} was settled or canceled concurrently."
                        )));
                    }
                    tx.status = TransactionStatus::Completed;
                    tx.block_id = Some(block.id.clone());
                    txs.insert(id.as_str(), encode(&tx)?)?;
                    pending.remove(seq_key(tx.seq))?;

                    if tx.kind == TransactionKind::NftTransfer {
                        if let Some(nft_id) = tx.nft_id.as_deref() {
                            let recipient = addresses
                                .get(tx.to_address.as_str())?
                                .map(|id| String::from_utf8_lossy(&id).to_string());
                            settle_nft_transfer(nfts, nft_id, &tx.id, recipient)?;
                        }
                    }
                    settled.push(tx);
                }

                blocks.insert(block.id.as_str(), block_bytes.as_slice())?;
                index.insert(index_key(block.index), block.id.as_str())?;
                put_transaction(txs, pending, commit.reward, &reward_bytes)?;
                Ok(settled)
            });
        Ok(result?)
    }

    // ---- nfts ----

    pub fn get_nft(&self, id: &str) -> Result<Option<Nft>> {
        self.nfts.get(id)?.map(|bytes| deserialize(&bytes)).transpose()
    }

    pub fn list_nfts(&self) -> Result<Vec<Nft>> {
        let mut nfts = self.decode_all::<Nft>(&self.nfts)?;
        nfts.sort_by_key(|n| n.created_at);
        Ok(nfts)
    }

    /// True if a pending NFT transfer is addressed to `address`
    pub fn has_incoming_nft_transfer(&self, address: &str) -> Result<bool> {
        let incoming = self.scan_transactions(
            &TransactionFilter {
                status: Some(TransactionStatus::Pending),
                kind: Some(TransactionKind::NftTransfer),
                to_address: Some(address.to_string()),
                ..TransactionFilter::default()
            },
            Some(1),
        )?;
        Ok(!incoming.is_empty())
    }

    /// True if any NFT is owned or was created by the wallet
    pub fn wallet_has_nfts(&self, wallet_id: &str) -> Result<bool> {
        for nft in self.decode_all::<Nft>(&self.nfts)? {
            if nft.creator_id == wallet_id || nft.owner_id.as_deref() == Some(wallet_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Creates an NFT and its minting transaction together
    pub fn insert_minted_nft(&self, nft: &Nft, minting: &Transaction) -> Result<()> {
        let nft_bytes = serialize(nft)?;
        let tx_bytes = serialize(minting)?;
        let result: TransactionResult<(), LedgerError> =
            (&self.nfts, &self.transactions, &self.pending, &self.wallets).transaction(
                |(nfts, txs, pending, wallets)| {
                    if wallets.get(nft.creator_id.as_str())?.is_none() {
                        return abort(LedgerError::NotFound(
                            "No wallet with this id exists".to_string(),
                        ));
                    }
                    nfts.insert(nft.id.as_str(), nft_bytes.as_slice())?;
                    put_transaction(txs, pending, minting, &tx_bytes)?;
                    Ok(())
                },
            );
        Ok(result?)
    }

    /// Queues an NFT transfer if `owner_id` still owns the NFT and no other
    /// transfer of it is pending
    pub fn insert_nft_transfer(&self, transfer: &Transaction, owner_id: &str) -> Result<()> {
        let nft_id = transfer
            .nft_id
            .as_deref()
            .ok_or_else(|| LedgerError::Validation("NFT transfer without an NFT.".to_string()))?;
        let tx_bytes = serialize(transfer)?;
        let result: TransactionResult<(), LedgerError> = (
            &self.nfts,
            &self.transactions,
            &self.pending,
            &self.wallet_addresses,
        )
            .transaction(|(nfts, txs, pending, addresses)| {
                if addresses.get(transfer.to_address.as_str())?.is_none() {
                    return abort(LedgerError::Validation(
                        "Invalid recipient address.".to_string(),
                    ));
                }
                let mut nft = load_live_nft(nfts, nft_id)?;
                if nft.owner_id.as_deref() != Some(owner_id) {
                    return abort(LedgerError::Conflict(
                        "NFT changed owner concurrently.".to_string(),
                    ));
                }
                if nft.pending_transfer.is_some() {
                    return abort(LedgerError::Conflict(
                        "NFT already has a pending transfer.".to_string(),
                    ));
                }
                nft.pending_transfer = Some(transfer.id.clone());
                nfts.insert(nft_id, encode(&nft)?)?;
                put_transaction(txs, pending, transfer, &tx_bytes)?;
                Ok(())
            });
        Ok(result?)
    }

    /// burned = true, owner = none, if `owner_id` still owns it and nothing is pending
    pub fn burn_nft(&self, id: &str, owner_id: &str) -> Result<Nft> {
        let result: TransactionResult<Nft, LedgerError> = self.nfts.transaction(|nfts| {
            let mut nft = load_live_nft(nfts, id)?;
            if nft.owner_id.as_deref() != Some(owner_id) {
                return abort(LedgerError::Conflict(
                    "NFT changed owner concurrently.".to_string(),
                ));
            }
            if nft.pending_transfer.is_some() {
                return abort(LedgerError::Conflict(
                    "NFT has a pending transfer and cannot be burned.".to_string(),
                ));
            }
            nft.burned = true;
            nft.owner_id = None;
            nfts.insert(id, encode(&nft)?)?;
            Ok(nft)
        });
        Ok(result?)
    }

    fn decode_all<T: bincode::Decode<()>>(&self, tree: &Tree) -> Result<Vec<T>> {
        let mut records = Vec::new();
        for item in tree.iter() {
            let (_, bytes) = item?;
            records.push(deserialize(&bytes)?);
        }
        Ok(records)
    }
}

fn index_key(index: u64) -> Vec<u8> {
    index.to_be_bytes().to_vec()
}

fn seq_key(seq: u64) -> Vec<u8> {
    seq.to_be_bytes().to_vec()
}

fn encode_all(transactions: &[Transaction]) -> Result<Vec<Vec<u8>>> {
    transactions.iter().map(serialize).collect()
}

fn encode<T: bincode::Encode>(record: &T) -> ConflictableTransactionResult<Vec<u8>, LedgerError> {
    serialize(record).map_err(ConflictableTransactionError::Abort)
}

fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> ConflictableTransactionResult<T, LedgerError> {
    deserialize(bytes).map_err(ConflictableTransactionError::Abort)
}

fn put_transaction(
    txs: &TransactionalTree,
    pending: &TransactionalTree,
    tx: &Transaction,
    bytes: &[u8],
) -> ConflictableTransactionResult<(), LedgerError> {
    if txs.get(tx.id.as_str())?.is_some() {
        return abort(LedgerError::Conflict(format!(
            "Transaction {} already exists.",
            tx.id
        )));
    }
    txs.insert(tx.id.as_str(), bytes)?;
    if tx.is_pending() {
        pending.insert(seq_key(tx.seq), tx.id.as_str())?;
    }
    Ok(())
}

fn load_live_nft(nfts: &TransactionalTree, id: &str) -> ConflictableTransactionResult<Nft, LedgerError> {
    let nft: Nft = match nfts.get(id)? {
        Some(bytes) => decode(&bytes)?,
        None => return abort(LedgerError::NotFound("NFT not found.".to_string())),
    };
    if nft.burned {
        return abort(LedgerError::NotFound("NFT not found.".to_string()));
    }
    Ok(nft)
}

fn release_nft_hold(
    nfts: &TransactionalTree,
    nft_id: &str,
    transfer_id: &str,
) -> ConflictableTransactionResult<(), LedgerError> {
    if let Some(bytes) = nfts.get(nft_id)? {
        let mut nft: Nft = decode(&bytes)?;
        if nft.pending_transfer.as_deref() == Some(transfer_id) {
            nft.pending_transfer = None;
            nfts.insert(nft_id, encode(&nft)?)?;
        }
    }
    Ok(())
}

fn settle_nft_transfer(
    nfts: &TransactionalTree,
    nft_id: &str,
    transfer_id: &str,
    recipient_wallet: Option<String>,
) -> ConflictableTransactionResult<(), LedgerError> {
    if let Some(bytes) = nfts.get(nft_id)? {
        let mut nft: Nft = decode(&bytes)?;
        if nft.pending_transfer.as_deref() == Some(transfer_id) {
            nft.pending_transfer = None;
            // A recipient whose wallet is gone leaves the NFT with its sender
            if let (false, Some(recipient)) = (nft.burned, recipient_wallet) {
                nft.owner_id = Some(recipient);
            }
            nfts.insert(nft_id, encode(&nft)?)?;
        }
    }
    Ok(())
}
