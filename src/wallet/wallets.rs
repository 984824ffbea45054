use crate::core::nft_ledger::wallet_lock;
use crate::core::BalanceCalculator;
use crate::error::{LedgerError, Result};
use crate::storage::{KeyedLocks, LedgerStore};
use crate::utils::current_timestamp;
use crate::wallet::{KeyContext, PrivateKey, Wallet};
use log::info;
use serde::Serialize;
use std::sync::Arc;

/// Returned once, on creation. The private key is not kept anywhere else.
#[derive(Debug, Clone)]
pub struct CreatedWallet {
    pub id: String,
    pub address: String,
    pub user_id: String,
    pub private_key: PrivateKey,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletWithBalance {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub balance: i128,
}

/// Registry of wallets backed by the ledger store
#[derive(Clone)]
pub struct Wallets {
    store: LedgerStore,
    keys: Arc<KeyContext>,
    locks: KeyedLocks,
    balances: BalanceCalculator,
}

impl Wallets {
    pub fn new(store: LedgerStore, keys: Arc<KeyContext>, locks: KeyedLocks) -> Wallets {
        Wallets {
            balances: BalanceCalculator::new(store.clone()),
            store,
            keys,
            locks,
        }
    }

    pub fn create_wallet(&self, user_id: &str) -> Result<CreatedWallet> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(LedgerError::Validation("A user id is required.".to_string()));
        }
        let key_pair = self.keys.generate_key_pair()?;
        let wallet = Wallet {
            id: uuid::Uuid::new_v4().to_string(),
            address: key_pair.address.clone(),
            user_id: user_id.to_string(),
            created_at: current_timestamp()?,
        };
        self.store.insert_wallet(&wallet)?;

        info!("Wallet {} created for user {user_id}", wallet.id);
        Ok(CreatedWallet {
            id: wallet.id,
            address: wallet.address,
            user_id: wallet.user_id,
            private_key: key_pair.private_key,
        })
    }

    pub fn get_all(&self) -> Result<Vec<Wallet>> {
        self.store.list_wallets()
    }

    pub fn get_by_id(&self, id: &str) -> Result<WalletWithBalance> {
        let wallet = self.find(id)?;
        let balance = self.balances.calculate_balance(&wallet.address)?;
        Ok(WalletWithBalance { wallet, balance })
    }

    pub fn find_by_address(&self, address: &str) -> Result<Option<Wallet>> {
        self.store.find_wallet_by_address(address)
    }

    /// Deletes the wallet if `private_key` belongs to it, it holds no NFTs and
    /// no NFT transfer to it is pending
    pub fn delete_wallet(&self, id: &str, private_key: &str) -> Result<()> {
        self.locks.run(&wallet_lock(id), || {
            let wallet = self.find(id)?;
            if !self.keys.proves_possession(private_key, &wallet.address) {
                return Err(LedgerError::Unauthorized(
                    "Incorrect private key, you are not allowed to delete this wallet."
                        .to_string(),
                ));
            }
            if self.store.wallet_has_nfts(&wallet.id)? {
                return Err(LedgerError::Conflict(
                    "Wallet owns or created NFTs and cannot be deleted.".to_string(),
                ));
            }
            if self.store.has_incoming_nft_transfer(&wallet.address)? {
                return Err(LedgerError::Conflict(
                    "Wallet has an incoming NFT transfer and cannot be deleted.".to_string(),
                ));
            }
            if !self.store.delete_wallet(&wallet)? {
                return Err(wallet_not_found());
            }
            info!("Wallet {id} deleted");
            Ok(())
        })
    }

    fn find(&self, id: &str) -> Result<Wallet> {
        self.store.get_wallet(id)?.ok_or_else(wallet_not_found)
    }
}

fn wallet_not_found() -> LedgerError {
    LedgerError::NotFound("Wallet not found".to_string())
}
