//! End-to-end tests of the ledger through its public API

use ledger_chain::{
    CreatedWallet, Curve, ErrorKind, Ledger, LedgerConfig, TransactionKind, TransactionStatus,
    TransferRequest,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::thread;
use tempfile::TempDir;

fn open_ledger(difficulty: u32, block_reward: u64) -> (Ledger, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LedgerConfig::with_data_dir(dir.path());
    config.mining.difficulty = difficulty;
    config.mining.block_reward = block_reward;
    (Ledger::open(config).unwrap(), dir)
}

/// Ledger whose genesis block paid `reward` to the returned wallet
fn funded_ledger(difficulty: u32, reward: u64) -> (Ledger, CreatedWallet, TempDir) {
    let (ledger, dir) = open_ledger(difficulty, reward);
    let bank = ledger.wallets().create_wallet("bank").unwrap();
    ledger.blockchain().initialize(&bank.address).unwrap();
    (ledger, bank, dir)
}

fn transfer(
    ledger: &Ledger,
    from: &CreatedWallet,
    to: &str,
    amount: u64,
) -> ledger_chain::Result<ledger_chain::PublicTransaction> {
    ledger.transactions().create_transfer(
        &TransferRequest {
            from_address: from.address.clone(),
            to_address: to.to_string(),
            amount,
        },
        from.private_key.as_hex(),
    )
}

#[test]
fn test_genesis_reward_is_balance() {
    let (ledger, bank, _dir) = funded_ledger(1, 100);
    assert_eq!(ledger.balances().calculate_balance(&bank.address).unwrap(), 100);

    let genesis = ledger.blockchain().tip().unwrap().unwrap();
    assert!(genesis.is_genesis());
    assert_eq!(genesis.get_previous_hash(), "");
    let with_txs = ledger.blockchain().get_by_id(genesis.get_id()).unwrap();
    assert_eq!(with_txs.transactions.len(), 1);
    assert_eq!(with_txs.transactions[0].get_status(), TransactionStatus::Completed);
    assert_eq!(with_txs.transactions[0].get_block_id(), Some(genesis.get_id()));
}

#[test]
fn test_transfer_beyond_balance_fails() {
    let (ledger, _dir) = open_ledger(1, 100);
    let alice = ledger.wallets().create_wallet("alice").unwrap();
    let bob = ledger.wallets().create_wallet("bob").unwrap();

    let err = transfer(&ledger, &alice, &bob.address, 1_000_000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(err.kind().code(), "VALIDATION_FAILED");
    assert!(err.to_string().to_lowercase().contains("insufficient balance"));
}

#[test]
fn test_seal_with_difficulty_two() {
    let (ledger, bank, _dir) = funded_ledger(2, 100);
    let miner = ledger.wallets().create_wallet("miner").unwrap();
    let tx = transfer(&ledger, &bank, &miner.address, 40).unwrap();

    let sealed = ledger.blockchain().seal_block(&miner.address).unwrap();
    assert!(sealed.block.get_hash().starts_with("00"));
    assert_eq!(sealed.block.get_transaction_ids(), &[tx.id.clone()]);

    let details = ledger.transactions().get_by_id(&tx.id).unwrap();
    assert_eq!(details.transaction.get_status(), TransactionStatus::Completed);
    assert_eq!(
        details.block.map(|b| b.get_id().to_string()),
        Some(sealed.block.get_id().to_string())
    );

    let pending: Vec<_> = ledger
        .transactions()
        .get_all()
        .unwrap()
        .into_iter()
        .filter(|t| t.status == TransactionStatus::Pending)
        .collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, TransactionKind::BlockReward);
    assert_eq!(pending[0].to_address, miner.address);
    assert_eq!(pending[0].amount, 100);
    assert!(pending[0].from_address.is_none());

    assert_eq!(ledger.balances().calculate_balance(&bank.address).unwrap(), 60);
    assert_eq!(ledger.balances().calculate_balance(&miner.address).unwrap(), 40);
}

#[test]
fn test_cancel_completed_transaction_conflicts() {
    let (ledger, bank, _dir) = funded_ledger(1, 100);
    let bob = ledger.wallets().create_wallet("bob").unwrap();
    let tx = transfer(&ledger, &bank, &bob.address, 10).unwrap();
    ledger.blockchain().seal_block(&bob.address).unwrap();

    let err = ledger
        .transactions()
        .cancel_transaction(&tx.id, bank.private_key.as_hex())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_delete_wallet_with_foreign_key() {
    let (ledger, _dir) = open_ledger(1, 100);
    let alice = ledger.wallets().create_wallet("alice").unwrap();
    let mallory = ledger.wallets().create_wallet("mallory").unwrap();

    let err = ledger
        .wallets()
        .delete_wallet(&alice.id, mallory.private_key.as_hex())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(ledger.wallets().get_by_id(&alice.id).is_ok());
}

#[test]
fn test_nft_round_trip_through_blocks() {
    let (ledger, bank, _dir) = funded_ledger(1, 100);
    let alice = ledger.wallets().create_wallet("alice").unwrap();
    let bob = ledger.wallets().create_wallet("bob").unwrap();
    let nfts = ledger.nfts();

    let nft = nfts
        .mint(&serde_json::json!({"name": "Comet"}), alice.private_key.as_hex())
        .unwrap();
    nfts.transfer(nft.get_id(), &bob.address, alice.private_key.as_hex())
        .unwrap();
    ledger.blockchain().seal_block(&bank.address).unwrap();

    let details = nfts.get_by_id(nft.get_id()).unwrap();
    assert_eq!(details.owner.map(|w| w.get_id().to_string()), Some(bob.id.clone()));
    assert_eq!(details.creator.map(|w| w.get_id().to_string()), Some(alice.id.clone()));
    let kinds: Vec<_> = details.transactions.iter().map(|t| t.get_kind()).collect();
    assert_eq!(kinds, vec![TransactionKind::Minting, TransactionKind::NftTransfer]);
    assert!(details
        .transactions
        .iter()
        .all(|t| t.get_status() == TransactionStatus::Completed));

    let burned = nfts.burn(nft.get_id(), bob.private_key.as_hex()).unwrap();
    assert!(burned.is_burned());
    let err = nfts.burn(nft.get_id(), bob.private_key.as_hex()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(ledger.blockchain().verify_chain().unwrap().is_valid());
}

#[test]
fn test_concurrent_transfers_never_overspend() {
    let (ledger, bank, _dir) = funded_ledger(1, 100);
    let bob = ledger.wallets().create_wallet("bob").unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ledger = ledger.clone();
            let bank = bank.clone();
            let to = bob.address.clone();
            thread::spawn(move || transfer(&ledger, &bank, &to, 30).is_ok())
        })
        .collect();
    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(admitted, 3);
    assert_eq!(ledger.balances().spendable_balance(&bank.address).unwrap(), 10);

    ledger.blockchain().seal_block(&bob.address).unwrap();
    assert_eq!(ledger.balances().calculate_balance(&bank.address).unwrap(), 10);
    assert_eq!(ledger.balances().calculate_balance(&bob.address).unwrap(), 90);
}

#[test]
fn test_concurrent_sealing_settles_each_transaction_once() {
    let (ledger, bank, _dir) = funded_ledger(1, 1_000);
    let miners: Vec<CreatedWallet> = (0..4)
        .map(|i| ledger.wallets().create_wallet(&format!("miner-{i}")).unwrap())
        .collect();
    for i in 0..20 {
        transfer(&ledger, &bank, &miners[i % 4].address, 1).unwrap();
    }

    let handles: Vec<_> = miners
        .iter()
        .map(|miner| {
            let ledger = ledger.clone();
            let address = miner.address.clone();
            thread::spawn(move || ledger.blockchain().seal_block(&address))
        })
        .collect();
    for handle in handles {
        if let Err(err) = handle.join().unwrap() {
            assert!(
                matches!(err.kind(), ErrorKind::Conflict | ErrorKind::NoWork),
                "unexpected error: {err}"
            );
        }
    }

    let blocks = ledger.blockchain().get_all().unwrap();
    let mut seen = HashSet::new();
    for (position, block) in blocks.iter().enumerate() {
        assert_eq!(block.get_index(), position as u64);
        for id in block.get_transaction_ids() {
            assert!(seen.insert(id.clone()), "transaction {id} sealed twice");
            let details = ledger.transactions().get_by_id(id).unwrap();
            assert_eq!(details.transaction.get_block_id(), Some(block.get_id()));
        }
    }
    assert!(ledger.blockchain().verify_chain().unwrap().is_valid());
}

#[test]
fn test_p384_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LedgerConfig::with_data_dir(dir.path());
    config.curve = Curve::P384;
    config.mining.difficulty = 1;
    let ledger = Ledger::open(config).unwrap();

    let bank = ledger.wallets().create_wallet("bank").unwrap();
    assert_eq!(bank.address.len(), 2 * Curve::P384.public_key_len());
    ledger.blockchain().initialize(&bank.address).unwrap();
    let bob = ledger.wallets().create_wallet("bob").unwrap();
    transfer(&ledger, &bank, &bob.address, 25).unwrap();
    ledger.blockchain().seal_block(&bob.address).unwrap();

    assert_eq!(ledger.balances().calculate_balance(&bob.address).unwrap(), 25);
    assert!(ledger.blockchain().verify_chain().unwrap().is_valid());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_balances_never_negative(
        ops in prop::collection::vec((0usize..3, 0usize..3, 1u64..150, any::<bool>()), 1..12)
    ) {
        let (ledger, bank, _dir) = funded_ledger(1, 100);
        let mut wallets = vec![bank];
        wallets.push(ledger.wallets().create_wallet("alice").unwrap());
        wallets.push(ledger.wallets().create_wallet("bob").unwrap());

        for (from, to, amount, mine) in ops {
            let _ = transfer(&ledger, &wallets[from], &wallets[to].address, amount);
            if mine {
                match ledger.blockchain().seal_block(&wallets[to].address) {
                    Ok(_) => {}
                    Err(err) => prop_assert_eq!(err.kind(), ErrorKind::NoWork),
                }
            }
            for wallet in &wallets {
                let balances = ledger.balances();
                prop_assert!(balances.calculate_balance(&wallet.address).unwrap() >= 0);
                prop_assert!(balances.spendable_balance(&wallet.address).unwrap() >= 0);
            }
        }
    }
}
