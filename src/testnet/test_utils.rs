use crate::config::Config;
use crate::core::{Ledger, PrevTransactions, TXInput, TXOutput, Transaction};
use crate::error::{LedgerError, Result};
use crate::wallet::Wallet;
use tempfile::TempDir;

/// Low enough that sealing takes a handful of attempts
pub const TEST_DIFFICULTY: u32 = 4;

pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| LedgerError::Io(e.to_string()))
}

/// A fresh ledger whose genesis reward belongs to the returned wallet. Keep
/// the `TempDir` alive for as long as the ledger is used.
pub fn create_test_ledger() -> Result<(Ledger, Wallet, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let config = Config::in_dir(temp_dir.path(), TEST_DIFFICULTY);
    let miner = Wallet::new()?;
    let ledger = Ledger::create(&miner.get_address(), &config)?;
    Ok((ledger, miner, temp_dir))
}

/// Spends output `index` of `funding` into a single output of `value`,
/// signed by `owner` against `prev_txs`. No balance check is made.
pub fn spend_output(
    owner: &Wallet,
    funding: &Transaction,
    index: usize,
    to_pub_key_hash: &[u8],
    value: u64,
    prev_txs: &PrevTransactions,
) -> Result<Transaction> {
    let input = TXInput::new(funding.get_id(), index, owner.get_public_key());
    let mut tx = Transaction::new(vec![input], vec![TXOutput::new(value, to_pub_key_hash)])?;
    tx.sign(owner.get_pkcs8(), prev_txs)?;
    Ok(tx)
}
