// Lifecycle of value transfers
// Admission (funds check + insert) runs under the sender's address lock so two
// transfers from the same address can never both spend the same balance

use crate::core::{
    BalanceCalculator, PublicTransaction, Transaction, TransactionDetails, TransactionKind,
    TransactionStatus, TransferRequest,
};
use crate::error::{LedgerError, Result};
use crate::storage::{KeyedLocks, LedgerStore};
use crate::utils::current_timestamp;
use crate::wallet::KeyContext;
use log::info;
use std::sync::Arc;

#[derive(Clone)]
pub struct TransactionLedger {
    store: LedgerStore,
    keys: Arc<KeyContext>,
    locks: KeyedLocks,
    balances: BalanceCalculator,
}

impl TransactionLedger {
    pub fn new(store: LedgerStore, keys: Arc<KeyContext>, locks: KeyedLocks) -> TransactionLedger {
        TransactionLedger {
            balances: BalanceCalculator::new(store.clone()),
            store,
            keys,
            locks,
        }
    }

    pub fn create_transfer(
        &self,
        request: &TransferRequest,
        private_key: &str,
    ) -> Result<PublicTransaction> {
        let from = normalize_address(&request.from_address);
        let to = normalize_address(&request.to_address);
        let (from, to) = (from.as_str(), to.as_str());
        if request.amount == 0 || from.is_empty() || to.is_empty() {
            return Err(LedgerError::Validation(
                "Invalid transaction data.".to_string(),
            ));
        }

        self.locks.run(&address_lock(from), || {
            let available = self.balances.spendable_balance(from)?;
            if available < i128::from(request.amount) {
                return Err(LedgerError::InsufficientFunds {
                    required: request.amount,
                    available,
                });
            }
            if !self.keys.proves_possession(private_key, from) {
                return Err(LedgerError::Unauthorized(
                    "Invalid private key for the from address.".to_string(),
                ));
            }

            let mut tx = Transaction::new_pending(
                self.store.next_sequence()?,
                TransactionKind::Transfer,
                request.amount,
                Some(from.to_string()),
                to.to_string(),
                current_timestamp()?,
            );
            tx.sign_with(&self.keys, private_key)?;
            self.store.insert_transactions(std::slice::from_ref(&tx))?;

            info!("Transfer {} admitted: {} from {from} to {to}", tx.id, tx.amount);
            Ok(PublicTransaction::from(&tx))
        })
    }

    /// pending -> canceled. Only the sender can cancel.
    pub fn cancel_transaction(&self, id: &str, private_key: &str) -> Result<PublicTransaction> {
        let tx = self.find(id)?;
        match tx.status {
            TransactionStatus::Completed => {
                return Err(LedgerError::Conflict(
                    "Transaction is linked to a block and cannot be deleted.".to_string(),
                ))
            }
            TransactionStatus::Canceled => {
                return Err(LedgerError::Conflict(
                    "Transaction is already canceled.".to_string(),
                ))
            }
            TransactionStatus::Pending => {}
        }
        if tx.kind == TransactionKind::Minting {
            return Err(LedgerError::Conflict(
                "Minting transactions cannot be canceled.".to_string(),
            ));
        }
        let authorized = tx
            .from_address
            .as_deref()
            .is_some_and(|from| self.keys.proves_possession(private_key, from));
        if !authorized {
            return Err(LedgerError::Unauthorized(
                "Invalid private key for the from address.".to_string(),
            ));
        }

        // Settlement may have won the race since the read above
        let canceled = self.store.cancel_transaction(id)?;
        info!("Transaction {id} canceled");
        Ok(PublicTransaction::from(&canceled))
    }

    pub fn get_by_id(&self, id: &str) -> Result<TransactionDetails> {
        let transaction = self.find(id)?;
        let block = match transaction.block_id.as_deref() {
            Some(block_id) => self.store.get_block(block_id)?,
            None => None,
        };
        let nft = match transaction.nft_id.as_deref() {
            Some(nft_id) => self.store.get_nft(nft_id)?,
            None => None,
        };
        Ok(TransactionDetails {
            transaction,
            block,
            nft,
        })
    }

    pub fn get_all(&self) -> Result<Vec<PublicTransaction>> {
        Ok(self
            .store
            .list_transactions()?
            .iter()
            .map(PublicTransaction::from)
            .collect())
    }

    fn find(&self, id: &str) -> Result<Transaction> {
        self.store
            .get_transaction(id)?
            .ok_or_else(|| LedgerError::NotFound("Transaction not found.".to_string()))
    }
}

/// Addresses are lowercase hex everywhere they are stored or compared
pub(crate) fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

fn address_lock(address: &str) -> String {
    format!("address:{address}")
}
