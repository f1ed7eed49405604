// Entry point for the ledger CLI. Every command loads the config, validates
// its address arguments, and only then touches the wallet file or the ledger.
use clap::Parser;
use data_encoding::HEXLOWER;
use log::{error, info, LevelFilter};
use std::process;
use utxo_ledger::{
    coins_to_units, convert_address, hash_pub_key, units_to_coins, validate_address, Command,
    Config, Ledger, LedgerError, Opt, Transaction, Wallets,
};

fn main() {
    // Info by default; RUST_LOG still wins when set
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn require_valid(address: &str, role: &str) -> Result<(), LedgerError> {
    if !validate_address(address) {
        return Err(LedgerError::InvalidAddress(format!(
            "{role} address {address}"
        )));
    }
    Ok(())
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    match command {
        Command::Createblockchain { address } => {
            require_valid(&address, "Genesis")?;
            let ledger = Ledger::create(&address, &config)?;
            info!("Genesis block {}", HEXLOWER.encode(ledger.get_tip_hash()));
            ledger.close()?;
            println!("Done!");
        }
        Command::Createwallet => {
            let mut wallets = Wallets::load(&config.wallet_path)?;
            let address = wallets.create_wallet()?;
            println!("Your new address: {address}")
        }
        Command::ListAddresses => {
            let wallets = Wallets::load(&config.wallet_path)?;
            for address in wallets.get_addresses() {
                println!("{address}")
            }
        }
        Command::GetBalance { address } => {
            require_valid(&address, "Target")?;
            let ledger = Ledger::open(&config)?;
            let balance = ledger.get_balance(&address)?;
            println!("Balance of {address}: {}", units_to_coins(balance));
            ledger.close()?;
        }
        Command::Send {
            from,
            to,
            amount,
            miner,
            data,
        } => {
            require_valid(&from, "Sender")?;
            require_valid(&to, "Recipient")?;
            require_valid(&miner, "Miner")?;
            let amount = coins_to_units(&amount)?;

            let wallets = Wallets::load(&config.wallet_path)?;
            let sender = wallets.get_wallet(&from).ok_or_else(|| {
                LedgerError::Wallet(format!("No key for {from} in the wallet file"))
            })?;
            let to_pub_key_hash = utxo_ledger::address_to_pub_key_hash(&to)?;
            let miner_pub_key_hash = utxo_ledger::address_to_pub_key_hash(&miner)?;

            let mut ledger = Ledger::open(&config)?;
            let transfer =
                Transaction::new_utxo_transaction(sender, &to_pub_key_hash, amount, &ledger)?;
            let coinbase = Transaction::new_coinbase_tx(&miner_pub_key_hash, data.as_bytes())?;
            let block = ledger.add_block(&[coinbase, transfer])?;
            info!(
                "Sealed block {} at difficulty {}",
                HEXLOWER.encode(block.get_hash()),
                ledger.get_difficulty()
            );
            ledger.close()?;

            println!("Success!")
        }
        Command::Printchain => {
            let ledger = Ledger::open(&config)?;
            for block in ledger.iter() {
                let block = block?;
                println!("Version:     {}", block.get_version());
                println!("Prev hash:   {}", HEXLOWER.encode(block.get_prev_hash()));
                println!("Hash:        {}", HEXLOWER.encode(block.get_hash()));
                println!("Merkle root: {}", HEXLOWER.encode(block.get_merkle_root()));
                println!("Timestamp:   {}", block.get_timestamp());
                println!("Difficulty:  {}", block.get_difficulty());
                println!("Nonce:       {}", block.get_nonce());

                for tx in block.get_transactions() {
                    println!("- Transaction {}", HEXLOWER.encode(tx.get_id()));
                    if !tx.is_coinbase() {
                        for input in tx.get_vin() {
                            let address = convert_address(&hash_pub_key(input.get_pub_key()));
                            println!(
                                "-- Input txid = {}, vout = {}, from = {}",
                                HEXLOWER.encode(input.get_txid()),
                                input.get_vout(),
                                address,
                            )
                        }
                    }
                    for output in tx.get_vout() {
                        println!(
                            "-- Output value = {}, to = {}",
                            units_to_coins(output.get_value()),
                            convert_address(output.get_pub_key_hash()),
                        )
                    }
                }
                println!()
            }
            ledger.close()?;
        }
        Command::PrintTx => {
            let ledger = Ledger::open(&config)?;
            for block in ledger.iter() {
                let block = block?;
                println!("\n===== Block {} =====", HEXLOWER.encode(block.get_hash()));
                for tx in block.get_transactions() {
                    println!("{tx}");
                }
            }
            ledger.close()?;
        }
        Command::VerifyChain => {
            let ledger = Ledger::open(&config)?;
            let count = ledger.verify_chain()?;
            ledger.close()?;
            println!("Chain is valid: {count} blocks checked");
        }
    }
    Ok(())
}
