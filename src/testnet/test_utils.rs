//! Test utilities for ledger testing

use crate::config::{LedgerConfig, MiningConfig};
use crate::core::{PublicTransaction, SealedBlock, TransferRequest};
use crate::wallet::CreatedWallet;
use crate::Ledger;
use tempfile::TempDir;

/// Reward paid by the fixture's genesis block and every sealed block
pub const TEST_BLOCK_REWARD: u64 = 1_000_000;

/// A ledger in a temporary directory with an initialized chain.
/// `bank` received the genesis reward and funds other wallets.
pub struct TestLedger {
    pub ledger: Ledger,
    pub bank: CreatedWallet,
    _dir: TempDir,
}

impl TestLedger {
    /// Difficulty 1 keeps mining fast
    pub fn new() -> TestLedger {
        Self::with_config(|_| {})
    }

    pub fn with_difficulty(difficulty: u32) -> TestLedger {
        Self::with_config(|mining| mining.difficulty = difficulty)
    }

    pub fn with_config(adjust: impl FnOnce(&mut MiningConfig)) -> TestLedger {
        let fixture = Self::open(adjust);
        fixture
            .ledger
            .blockchain()
            .initialize(&fixture.bank.address)
            .unwrap();
        fixture
    }

    /// No genesis block yet
    pub fn uninitialized() -> TestLedger {
        Self::open(|_| {})
    }

    fn open(adjust: impl FnOnce(&mut MiningConfig)) -> TestLedger {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LedgerConfig::with_data_dir(dir.path());
        config.mining.difficulty = 1;
        config.mining.block_reward = TEST_BLOCK_REWARD;
        adjust(&mut config.mining);

        let ledger = Ledger::open(config).unwrap();
        let bank = ledger.wallets().create_wallet("bank").unwrap();
        TestLedger {
            ledger,
            bank,
            _dir: dir,
        }
    }

    pub fn wallet(&self, user_id: &str) -> CreatedWallet {
        self.ledger.wallets().create_wallet(user_id).unwrap()
    }

    /// A wallet holding `amount` in settled funds, paid by the bank
    pub fn funded_wallet(&self, user_id: &str, amount: u64) -> CreatedWallet {
        let wallet = self.wallet(user_id);
        self.send(&self.bank, &wallet.address, amount);
        self.mine(&self.bank.address);
        wallet
    }

    pub fn send(&self, from: &CreatedWallet, to: &str, amount: u64) -> PublicTransaction {
        self.ledger
            .transactions()
            .create_transfer(
                &TransferRequest {
                    from_address: from.address.clone(),
                    to_address: to.to_string(),
                    amount,
                },
                from.private_key.as_hex(),
            )
            .unwrap()
    }

    pub fn mine(&self, miner: &str) -> SealedBlock {
        self.ledger.blockchain().seal_block(miner).unwrap()
    }
}
