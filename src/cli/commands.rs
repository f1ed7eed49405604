use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "utxo-ledger", about = "A local single-writer UTXO ledger")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createblockchain", about = "Create a new ledger")]
    Createblockchain {
        #[arg(help = "The address to send the genesis block reward to")]
        address: String,
    },
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet,
    #[command(name = "listaddresses", about = "Print local wallet addresses")]
    ListAddresses,
    #[command(
        name = "getbalance",
        about = "Get the balance of the target address"
    )]
    GetBalance {
        #[arg(help = "The wallet address")]
        address: String,
    },
    #[command(
        name = "send",
        about = "Transfer coins and seal the transfer with a reward to MINER"
    )]
    Send {
        #[arg(help = "Source wallet address")]
        from: String,
        #[arg(help = "Destination wallet address")]
        to: String,
        #[arg(help = "Amount to send in coins, e.g. 2.5")]
        amount: String,
        #[arg(help = "Address that receives the block reward")]
        miner: String,
        #[arg(default_value = "", help = "Data stored in the coinbase input")]
        data: String,
    },
    #[command(name = "printchain", about = "Print all blocks from tip to genesis")]
    Printchain,
    #[command(name = "printtx", about = "Print every transaction on the ledger")]
    PrintTx,
    #[command(
        name = "verifychain",
        about = "Re-check proof-of-work, Merkle roots and links of every block"
    )]
    VerifyChain,
}
