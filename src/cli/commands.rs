use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-chain")]
pub struct Opt {
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet {
        #[arg(help = "Id of the user the wallet belongs to")]
        user_id: String,
    },
    #[command(name = "listwallets", about = "Print all wallets")]
    ListWallets,
    #[command(name = "deletewallet", about = "Delete a wallet")]
    DeleteWallet {
        #[arg(help = "Wallet id")]
        id: String,
        #[arg(help = "Private key of the wallet")]
        private_key: String,
    },
    #[command(name = "getbalance", about = "Get the settled balance of an address")]
    GetBalance {
        #[arg(help = "The address to get the balance for")]
        address: String,
    },
    #[command(name = "initchain", about = "Mine the genesis block")]
    InitChain {
        #[arg(help = "Wallet address that receives the genesis reward")]
        address: String,
    },
    #[command(name = "send", about = "Queue a transfer")]
    Send {
        #[arg(help = "Source wallet address")]
        from: String,
        #[arg(help = "Destination address")]
        to: String,
        #[arg(help = "Amount to send")]
        amount: u64,
        #[arg(help = "Private key of the source wallet")]
        private_key: String,
    },
    #[command(name = "cancel", about = "Cancel a pending transaction")]
    Cancel {
        #[arg(help = "Transaction id")]
        id: String,
        #[arg(help = "Private key of the sender")]
        private_key: String,
    },
    #[command(name = "mine", about = "Seal pending transactions into a block")]
    Mine {
        #[arg(help = "Wallet address that receives the block reward")]
        address: String,
    },
    #[command(name = "listtransactions", about = "Print all transactions")]
    ListTransactions,
    #[command(name = "printchain", about = "Print blockchain all block")]
    Printchain,
    #[command(name = "verifychain", about = "Check hashes, links and settlements of the chain")]
    VerifyChain,
    #[command(name = "mint", about = "Mint an NFT")]
    Mint {
        #[arg(help = "NFT metadata as JSON")]
        metadata: String,
        #[arg(help = "Private key of the creating wallet")]
        private_key: String,
    },
    #[command(name = "transfernft", about = "Queue an NFT transfer")]
    TransferNft {
        #[arg(help = "NFT id")]
        id: String,
        #[arg(help = "Recipient wallet address")]
        to: String,
        #[arg(help = "Private key of the owning wallet")]
        private_key: String,
    },
    #[command(name = "burn", about = "Burn an NFT")]
    Burn {
        #[arg(help = "NFT id")]
        id: String,
        #[arg(help = "Private key of the owning wallet")]
        private_key: String,
    },
    #[command(name = "listnfts", about = "Print all NFTs")]
    ListNfts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_arguments() {
        let opt = Opt::try_parse_from(["ledger-chain", "send", "04aa", "04bb", "25", "3077"]).unwrap();
        match opt.command {
            Command::Send {
                from,
                to,
                amount,
                private_key,
            } => {
                assert_eq!(from, "04aa");
                assert_eq!(to, "04bb");
                assert_eq!(amount, 25);
                assert_eq!(private_key, "3077");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(opt.config.is_none());
    }

    #[test]
    fn test_global_config_flag() {
        let opt =
            Opt::try_parse_from(["ledger-chain", "printchain", "--config", "ledger.toml"]).unwrap();
        assert_eq!(opt.config, Some(PathBuf::from("ledger.toml")));
        assert!(matches!(opt.command, Command::Printchain));
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        assert!(Opt::try_parse_from(["ledger-chain", "send", "a", "b", "-5", "k"]).is_err());
    }
}
