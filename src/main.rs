// Entry point of the ledger CLI
// Every command opens the ledger, runs one operation and prints the result
use clap::Parser;
use ledger_chain::{
    Command, Ledger, LedgerConfig, LedgerError, Opt, TransactionStatus, TransferRequest,
};
use log::LevelFilter;
use std::process;

fn main() {
    // RUST_LOG still overrides the Info default
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    if let Err(e) = run(opt) {
        eprintln!("{}: {e}", e.kind().code());
        process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), LedgerError> {
    let config = LedgerConfig::load(opt.config.as_deref())?;
    let ledger = Ledger::open(config)?;
    run_command(&ledger, opt.command)?;
    ledger.flush()
}

fn run_command(ledger: &Ledger, command: Command) -> Result<(), LedgerError> {
    match command {
        Command::Createwallet { user_id } => {
            let wallet = ledger.wallets().create_wallet(&user_id)?;
            println!("Wallet id: {}", wallet.id);
            println!("Your new address: {}", wallet.address);
            // Shown once, never stored
            println!("Private key: {}", wallet.private_key.as_hex());
        }
        Command::ListWallets => {
            for wallet in ledger.wallets().get_all()? {
                println!(
                    "{} user={} address={}",
                    wallet.get_id(),
                    wallet.get_user_id(),
                    wallet.get_address()
                );
            }
        }
        Command::DeleteWallet { id, private_key } => {
            ledger.wallets().delete_wallet(&id, &private_key)?;
            println!("Wallet {id} deleted");
        }
        Command::GetBalance { address } => {
            let balance = ledger.balances().calculate_balance(&address)?;
            println!("Balance of {address}: {balance}");
        }
        Command::InitChain { address } => {
            let genesis = ledger.blockchain().initialize(&address)?;
            println!("Genesis block: {}", genesis.block.get_hash());
        }
        Command::Send {
            from,
            to,
            amount,
            private_key,
        } => {
            let request = TransferRequest {
                from_address: from,
                to_address: to,
                amount,
            };
            let tx = ledger
                .transactions()
                .create_transfer(&request, &private_key)?;
            println!("Pending transaction: {}", tx.id);
        }
        Command::Cancel { id, private_key } => {
            let tx = ledger.transactions().cancel_transaction(&id, &private_key)?;
            println!("Transaction {} is {}", tx.id, tx.status);
        }
        Command::Mine { address } => {
            let sealed = ledger.blockchain().seal_block(&address)?;
            println!(
                "Mined block {} with {} transactions: {}",
                sealed.block.get_index(),
                sealed.transactions.len(),
                sealed.block.get_hash()
            );
            println!("Reward transaction: {}", sealed.reward.get_id());
        }
        Command::ListTransactions => {
            for tx in ledger.transactions().get_all()? {
                let marker = match tx.status {
                    TransactionStatus::Pending => "*",
                    _ => " ",
                };
                println!(
                    "{marker} {} {} {} {} -> {} ({})",
                    tx.id,
                    tx.kind,
                    tx.amount,
                    tx.from_address.as_deref().unwrap_or("-"),
                    tx.to_address,
                    tx.status
                );
            }
        }
        Command::Printchain => {
            let chain = ledger.blockchain();
            for block in chain.get_all()? {
                println!("Index: {}", block.get_index());
                println!("Pre block hash: {}", block.get_previous_hash());
                println!("Cur block hash: {}", block.get_hash());
                println!("Cur block Timestamp: {}", block.get_timestamp());
                println!("Nonce: {}", block.get_nonce());
                for tx in chain.get_by_id(block.get_id())?.transactions {
                    println!(
                        "- Transaction {} ({}): {} from {} to {}",
                        tx.get_id(),
                        tx.get_kind(),
                        tx.get_amount(),
                        tx.get_from_address().unwrap_or("-"),
                        tx.get_to_address()
                    );
                }
                println!()
            }
        }
        Command::VerifyChain => {
            let report = ledger.blockchain().verify_chain()?;
            for fault in &report.faults {
                println!("block {} ({}): {}", fault.index, fault.block_id, fault.message);
            }
            if !report.is_valid() {
                return Err(LedgerError::Conflict(format!(
                    "Chain of {} blocks has {} faults",
                    report.blocks,
                    report.faults.len()
                )));
            }
            println!("Chain of {} blocks is valid", report.blocks);
        }
        Command::Mint {
            metadata,
            private_key,
        } => {
            let metadata: serde_json::Value = serde_json::from_str(&metadata)
                .map_err(|e| LedgerError::Validation(format!("Invalid metadata: {e}")))?;
            let nft = ledger.nfts().mint(&metadata, &private_key)?;
            println!("Minted NFT: {}", nft.get_id());
        }
        Command::TransferNft {
            id,
            to,
            private_key,
        } => {
            let tx = ledger.nfts().transfer(&id, &to, &private_key)?;
            println!("Pending NFT transfer: {}", tx.id);
        }
        Command::Burn { id, private_key } => {
            ledger.nfts().burn(&id, &private_key)?;
            println!("NFT {id} burned");
        }
        Command::ListNfts => {
            for nft in ledger.nfts().get_all()? {
                let owner = if nft.is_burned() {
                    "burned"
                } else {
                    nft.get_owner_id().unwrap_or("-")
                };
                println!("{} owner={owner} creator={}", nft.get_id(), nft.get_creator_id());
            }
        }
    }
    Ok(())
}
