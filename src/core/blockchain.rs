// Block sealer and chain reads
// Sealing: select pending transactions -> anchor to the tip -> proof-of-work -> one atomic commit
// The hash search runs without any lock held; only the commit is transactional and it
// re-checks everything the search assumed, so a lost race is retried with a fresh selection

use crate::config::MiningConfig;
use crate::core::proof_of_work::{CancelToken, MiningBudget, PowOutcome, ProofOfWork};
use crate::core::transaction::serialize_for_hash;
use crate::core::{Block, BlockWithTransactions, Transaction, TransactionKind, TransactionStatus};
use crate::error::{LedgerError, Result};
use crate::storage::{LedgerStore, SealCommit};
use crate::utils::current_timestamp;
use crate::wallet::KeyContext;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

/// A freshly sealed block, its settled transactions and the reward it queued
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedBlock {
    #[serde(flatten)]
    pub block: Block,
    pub transactions: Vec<Transaction>,
    pub reward: Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainFault {
    pub index: u64,
    pub block_id: String,
    pub message: String,
}

/// Outcome of a full chain walk
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub blocks: usize,
    pub faults: Vec<ChainFault>,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.faults.is_empty()
    }

    fn fault(&mut self, block: &Block, message: String) {
        self.faults.push(ChainFault {
            index: block.index,
            block_id: block.id.clone(),
            message,
        });
    }
}

#[derive(Clone)]
pub struct Blockchain {
    store: LedgerStore,
    keys: Arc<KeyContext>,
    mining: MiningConfig,
}

impl Blockchain {
    pub fn new(store: LedgerStore, keys: Arc<KeyContext>, mining: MiningConfig) -> Blockchain {
        Blockchain {
            store,
            keys,
            mining,
        }
    }

    /// Mines block 0, paying the configured reward to `genesis_address`
    pub fn initialize(&self, genesis_address: &str) -> Result<BlockWithTransactions> {
        if self.store.tip_block()?.is_some() {
            return Err(LedgerError::Conflict(
                "Blockchain already initialized.".to_string(),
            ));
        }
        if self.store.find_wallet_by_address(genesis_address)?.is_none() {
            return Err(LedgerError::Validation(
                "Invalid genesis address.".to_string(),
            ));
        }
        info!("Creating genesis block for address: {genesis_address}");

        let timestamp = current_timestamp()?;
        let mut reward = Transaction::new_pending(
            self.store.next_sequence()?,
            TransactionKind::BlockReward,
            self.mining.block_reward,
            None,
            genesis_address.to_string(),
            timestamp,
        );
        let payload = serialize_for_hash(std::slice::from_ref(&reward))?;
        let (nonce, hash) = self.search(0, "", timestamp, &payload, &self.budget())?;

        let block = Block {
            id: uuid::Uuid::new_v4().to_string(),
            index: 0,
            timestamp,
            previous_hash: String::new(),
            hash,
            nonce,
            difficulty: self.mining.difficulty,
            transaction_ids: vec![reward.id.clone()],
        };
        reward.status = TransactionStatus::Completed;
        reward.block_id = Some(block.id.clone());
        self.store.commit_genesis(&block, &reward)?;

        info!("Genesis block {} sealed", block.hash);
        Ok(BlockWithTransactions {
            block,
            transactions: vec![reward],
        })
    }

    /// Seals the oldest pending transactions into a new block for `miner_address`
    /// within the configured mining budget
    pub fn seal_block(&self, miner_address: &str) -> Result<SealedBlock> {
        self.seal_with_budget(miner_address, &self.budget())
    }

    /// Like [`Blockchain::seal_block`], stoppable through `cancel`
    pub fn seal_block_with_cancel(
        &self,
        miner_address: &str,
        cancel: CancelToken,
    ) -> Result<SealedBlock> {
        self.seal_with_budget(miner_address, &self.budget().with_cancel(cancel))
    }

    pub fn seal_with_budget(
        &self,
        miner_address: &str,
        budget: &MiningBudget,
    ) -> Result<SealedBlock> {
        if self.store.find_wallet_by_address(miner_address)?.is_none() {
            return Err(LedgerError::Validation("Invalid miner address.".to_string()));
        }

        let mut attempt = 0;
        loop {
            match self.try_seal(miner_address, budget) {
                Err(LedgerError::Conflict(reason)) if attempt < self.mining.commit_retries => {
                    attempt += 1;
                    warn!("Seal attempt {attempt} lost a race ({reason}), retrying");
                }
                Err(LedgerError::Conflict(reason)) => {
                    return Err(LedgerError::Conflict(format!(
                        "Unable to create block: {reason}"
                    )))
                }
                other => return other,
            }
        }
    }

    fn try_seal(&self, miner_address: &str, budget: &MiningBudget) -> Result<SealedBlock> {
        let selected = self
            .store
            .pending_transactions(self.mining.max_transactions_per_block)?;
        if selected.is_empty() {
            return Err(LedgerError::NoWork);
        }
        let tip = self
            .store
            .tip_block()?
            .ok_or(LedgerError::ChainUninitialized)?;

        let index = tip.index + 1;
        let timestamp = current_timestamp()?;
        let payload = serialize_for_hash(&selected)?;
        info!(
            "Mining block {index} with {} transactions (difficulty: {})",
            selected.len(),
            self.mining.difficulty
        );
        let (nonce, hash) = self.search(index, &tip.hash, timestamp, &payload, budget)?;

        let transaction_ids: Vec<String> = selected.iter().map(|tx| tx.id.clone()).collect();
        let block = Block {
            id: uuid::Uuid::new_v4().to_string(),
            index,
            timestamp,
            previous_hash: tip.hash,
            hash,
            nonce,
            difficulty: self.mining.difficulty,
            transaction_ids,
        };
        let reward = Transaction::new_pending(
            self.store.next_sequence()?,
            TransactionKind::BlockReward,
            self.mining.block_reward,
            None,
            miner_address.to_string(),
            timestamp,
        );

        let transactions = self.store.commit_sealed_block(&SealCommit {
            block: &block,
            settled_ids: &block.transaction_ids,
            reward: &reward,
        })?;

        info!(
            "Successfully mined block {index}: {} (nonce: {nonce})",
            block.hash
        );
        Ok(SealedBlock {
            block,
            transactions,
            reward,
        })
    }

    fn search(
        &self,
        index: u64,
        previous_hash: &str,
        timestamp: i64,
        payload: &str,
        budget: &MiningBudget,
    ) -> Result<(u64, String)> {
        let mut pow = ProofOfWork::new_proof_of_work(
            index,
            previous_hash,
            timestamp,
            payload,
            self.mining.difficulty,
        );
        match pow.run(budget) {
            PowOutcome::Found { nonce, hash } => Ok((nonce, hash)),
            PowOutcome::Exhausted(reason) => {
                warn!("Mining block {index} aborted after nonce {}: {reason}", pow.get_nonce());
                Err(LedgerError::MiningAborted(reason))
            }
        }
    }

    fn budget(&self) -> MiningBudget {
        MiningBudget::from_config(&self.mining)
    }

    /// Highest-index block, if the chain has been initialized
    pub fn tip(&self) -> Result<Option<Block>> {
        self.store.tip_block()
    }

    /// All blocks ordered by index, without their transactions
    pub fn get_all(&self) -> Result<Vec<Block>> {
        self.store.list_blocks()
    }

    pub fn get_by_id(&self, id: &str) -> Result<BlockWithTransactions> {
        let block = self
            .store
            .get_block(id)?
            .ok_or_else(|| LedgerError::NotFound("Block not found.".to_string()))?;
        let transactions = self.store.transactions_of_block(&block)?;
        Ok(BlockWithTransactions {
            block,
            transactions,
        })
    }

    /// Walks the chain from genesis and reports every broken link, hash or settlement
    pub fn verify_chain(&self) -> Result<ChainReport> {
        let blocks = self.store.list_blocks()?;
        let mut report = ChainReport {
            blocks: blocks.len(),
            faults: Vec::new(),
        };

        let mut previous: Option<&Block> = None;
        for (position, block) in blocks.iter().enumerate() {
            if block.index != position as u64 {
                report.fault(block, format!("expected index {position}"));
            }
            let expected_previous = previous.map_or("", |p| p.hash.as_str());
            if block.previous_hash != expected_previous {
                report.fault(block, "previous hash does not match".to_string());
            }

            let mut transactions = Vec::with_capacity(block.transaction_ids.len());
            for id in &block.transaction_ids {
                match self.store.get_transaction(id)? {
                    Some(tx) => transactions.push(tx),
                    None => report.fault(block, format!("transaction {id} is missing")),
                }
            }
            if transactions.len() == block.transaction_ids.len() {
                let payload = serialize_for_hash(&transactions)?;
                if !ProofOfWork::validate(block, &payload) {
                    report.fault(block, "hash does not match proof of work".to_string());
                }
            }

            for tx in &transactions {
                if tx.status != TransactionStatus::Completed
                    || tx.block_id.as_deref() != Some(block.id.as_str())
                {
                    report.fault(block, format!("transaction {} is not settled here", tx.id));
                }
                if tx.from_address.is_some() && !tx.verify_signature(&self.keys) {
                    report.fault(block, format!("transaction {} has a bad signature", tx.id));
                }
            }
            previous = Some(block);
        }

        if report.is_valid() {
            info!("Chain verified: {} blocks", report.blocks);
        } else {
            warn!("Chain verification found {} faults", report.faults.len());
        }
        Ok(report)
    }
}
