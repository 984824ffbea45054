use crate::core::transaction_ledger::normalize_address;
use crate::core::{Nft, NftDetails, PublicTransaction, Transaction, TransactionKind};
use crate::error::{LedgerError, Result};
use crate::storage::{KeyedLocks, LedgerStore, TransactionFilter};
use crate::utils::current_timestamp;
use crate::wallet::{KeyContext, Wallet};
use log::info;
use std::sync::Arc;

/// Mint, transfer and burn bookkeeping for NFTs.
///
/// Ownership is a wallet id. A transfer is queued as a signed `nft_transfer`
/// transaction and ownership moves when a sealed block settles it.
#[derive(Clone)]
pub struct NftLedger {
    store: LedgerStore,
    keys: Arc<KeyContext>,
    locks: KeyedLocks,
}

impl NftLedger {
    pub fn new(store: LedgerStore, keys: Arc<KeyContext>, locks: KeyedLocks) -> NftLedger {
        NftLedger { store, keys, locks }
    }

    /// Creates an NFT owned by the wallet behind `private_key`, together with
    /// its pending minting transaction
    pub fn mint(&self, metadata: &serde_json::Value, private_key: &str) -> Result<Nft> {
        let creator = self.wallet_for_key(private_key)?;
        let metadata = serde_json::to_string(metadata)?;

        self.locks.run(&wallet_lock(&creator.id), || {
            let timestamp = current_timestamp()?;
            let nft = Nft::new(metadata, &creator.id, timestamp);
            let mut minting = Transaction::new_pending(
                self.store.next_sequence()?,
                TransactionKind::Minting,
                0,
                Some(creator.address.clone()),
                creator.address.clone(),
                timestamp,
            );
            minting.nft_id = Some(nft.id.clone());
            minting.sign_with(&self.keys, private_key)?;

            self.store.insert_minted_nft(&nft, &minting)?;
            info!("NFT {} minted by wallet {}", nft.id, creator.id);
            Ok(nft)
        })
    }

    /// Queues a transfer of the NFT to `to_address`
    pub fn transfer(
        &self,
        id: &str,
        to_address: &str,
        private_key: &str,
    ) -> Result<PublicTransaction> {
        let to_address = normalize_address(to_address);
        self.locks.run(&nft_lock(id), || {
            let (nft, owner) = self.owned_nft(id)?;
            if !self.keys.proves_possession(private_key, &owner.address) {
                return Err(LedgerError::Unauthorized(
                    "You cannot transfer this NFT.".to_string(),
                ));
            }
            if self.store.find_wallet_by_address(&to_address)?.is_none() {
                return Err(LedgerError::Validation(
                    "Invalid recipient address.".to_string(),
                ));
            }
            if nft.pending_transfer.is_some() {
                return Err(LedgerError::Conflict(
                    "NFT already has a pending transfer.".to_string(),
                ));
            }

            let mut transfer = Transaction::new_pending(
                self.store.next_sequence()?,
                TransactionKind::NftTransfer,
                0,
                Some(owner.address.clone()),
                to_address.clone(),
                current_timestamp()?,
            );
            transfer.nft_id = Some(nft.id.clone());
            transfer.sign_with(&self.keys, private_key)?;

            self.store.insert_nft_transfer(&transfer, &owner.id)?;
            info!("NFT {id} transfer {} queued to {to_address}", transfer.id);
            Ok(PublicTransaction::from(&transfer))
        })
    }

    /// Irreversibly burns the NFT. Only its owner can do this.
    pub fn burn(&self, id: &str, private_key: &str) -> Result<Nft> {
        self.locks.run(&nft_lock(id), || {
            let (nft, owner) = self.owned_nft(id)?;
            if !self.keys.proves_possession(private_key, &owner.address) {
                return Err(LedgerError::Unauthorized(
                    "You cannot burn this NFT.".to_string(),
                ));
            }
            if nft.pending_transfer.is_some() {
                return Err(LedgerError::Conflict(
                    "NFT has a pending transfer and cannot be burned.".to_string(),
                ));
            }

            let burned = self.store.burn_nft(id, &owner.id)?;
            info!("NFT {id} burned by wallet {}", owner.id);
            Ok(burned)
        })
    }

    pub fn get_by_id(&self, id: &str) -> Result<NftDetails> {
        let nft = self
            .store
            .get_nft(id)?
            .ok_or_else(|| LedgerError::NotFound("NFT not found.".to_string()))?;
        let transactions = self.store.scan_transactions(
            &TransactionFilter {
                nft_id: Some(nft.id.clone()),
                ..TransactionFilter::default()
            },
            None,
        )?;
        let owner = match nft.owner_id.as_deref() {
            Some(owner_id) => self.store.get_wallet(owner_id)?,
            None => None,
        };
        let creator = self.store.get_wallet(&nft.creator_id)?;
        Ok(NftDetails {
            nft,
            transactions,
            owner,
            creator,
        })
    }

    pub fn get_all(&self) -> Result<Vec<Nft>> {
        self.store.list_nfts()
    }

    fn wallet_for_key(&self, private_key: &str) -> Result<Wallet> {
        let invalid = || LedgerError::Unauthorized("Invalid private key.".to_string());
        let address = self
            .keys
            .derive_public_address(private_key)
            .map_err(|_| invalid())?;
        self.store.find_wallet_by_address(&address)?.ok_or_else(invalid)
    }

    /// A live NFT and the wallet that currently owns it
    fn owned_nft(&self, id: &str) -> Result<(Nft, Wallet)> {
        let nft = match self.store.get_nft(id)? {
            Some(nft) if !nft.burned => nft,
            _ => return Err(LedgerError::NotFound("NFT not found.".to_string())),
        };
        let owner = match nft.owner_id.as_deref() {
            Some(owner_id) => self.store.get_wallet(owner_id)?,
            None => None,
        };
        let owner =
            owner.ok_or_else(|| LedgerError::NotFound("NFT owner not found.".to_string()))?;
        Ok((nft, owner))
    }
}

pub(crate) fn wallet_lock(wallet_id: &str) -> String {
    format!("wallet:{wallet_id}")
}

fn nft_lock(nft_id: &str) -> String {
    format!("nft:{nft_id}")
}
