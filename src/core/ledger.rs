// The ledger: an append-only, backward-linked chain of sealed blocks kept in a
// sled store. Balances and spendable outputs are recomputed by walking the
// chain from tip to genesis; no UTXO index is persisted.

use crate::config::Config;
use crate::core::transaction::PrevTransactions;
use crate::core::{Block, ProofOfWork, TXOutput, Transaction, BLOCK_REWARD};
use crate::error::{LedgerError, Result};
use crate::storage::BlockStore;
use crate::wallet::address_to_pub_key_hash;
use data_encoding::HEXLOWER;
use log::{error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;

/// Payload of the genesis coinbase input
pub const GENESIS_DATA: &[u8] = b"Genesis block of the UTXO ledger";

/// An unspent output together with where it was created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub txid: Vec<u8>,
    pub index: usize,
    pub output: TXOutput,
}

// Transaction ids on the chain and every (txid, output index) spent by a
// recorded non-coinbase input
#[derive(Default)]
struct RecordedState {
    txids: HashSet<Vec<u8>>,
    spent: HashSet<(Vec<u8>, i64)>,
}

/// Handle to one on-disk ledger. Appending takes `&mut self`; the store allows
/// a single writer.
pub struct Ledger {
    store: BlockStore,
    tip: Vec<u8>,
    difficulty: u32,
}

impl Ledger {
    /// Creates a new ledger whose genesis block pays the reward to `miner_address`
    pub fn create(miner_address: &str, config: &Config) -> Result<Ledger> {
        config.validate()?;
        let miner_pub_key_hash = address_to_pub_key_hash(miner_address)?;
        let store = BlockStore::create(&config.db_path)?;

        info!("Creating genesis block for address: {miner_address}");
        let coinbase = Transaction::new_coinbase_tx(&miner_pub_key_hash, GENESIS_DATA)?;
        let genesis = Block::new_block(&[coinbase], &[], config.difficulty)?;
        store.put_tip_block(&genesis)?;

        Ok(Ledger {
            store,
            tip: genesis.get_hash().to_vec(),
            difficulty: config.difficulty,
        })
    }

    /// Opens an existing ledger and loads its tip
    pub fn open(config: &Config) -> Result<Ledger> {
        config.validate()?;
        let store = BlockStore::open(&config.db_path)?;
        let tip = store.tip()?.ok_or_else(|| {
            LedgerError::Config("Ledger has no tip. Create one first.".to_string())
        })?;
        Ok(Ledger {
            store,
            tip,
            difficulty: config.difficulty,
        })
    }

    /// Flushes pending writes and releases the store
    pub fn close(self) -> Result<()> {
        self.store.flush()
    }

    pub fn get_tip_hash(&self) -> &[u8] {
        self.tip.as_slice()
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Blocks from tip back to genesis. Each call starts a fresh walk.
    pub fn iter(&self) -> LedgerIterator {
        LedgerIterator {
            store: self.store.clone(),
            next_hash: Some(self.tip.clone()),
        }
    }

    pub fn add_block(&mut self, transactions: &[Transaction]) -> Result<Block> {
        let never = AtomicBool::new(false);
        self.add_block_cancellable(transactions, &never)
    }

    /// Drops invalid transactions, seals the rest on top of the tip, persists
    /// the block and advances the tip. The tip is untouched on any error.
    pub fn add_block_cancellable(
        &mut self,
        transactions: &[Transaction],
        cancel: &AtomicBool,
    ) -> Result<Block> {
        let valid = self.screen_transactions(transactions)?;
        if valid.is_empty() {
            return Err(LedgerError::InvalidBlock(
                "No valid transactions to seal".to_string(),
            ));
        }

        let block = Block::new_block_cancellable(&valid, &self.tip, self.difficulty, cancel)?;
        self.store.put_tip_block(&block)?;
        self.tip = block.get_hash().to_vec();
        info!(
            "Appended block {} with {} of {} transactions",
            HEXLOWER.encode(block.get_hash()),
            valid.len(),
            transactions.len()
        );
        Ok(block)
    }

    fn screen_transactions(&self, transactions: &[Transaction]) -> Result<Vec<Transaction>> {
        let recorded = self.recorded_state()?;
        let mut claimed: HashSet<(Vec<u8>, i64)> = HashSet::new();
        let mut batch_ids: HashSet<Vec<u8>> = HashSet::new();
        let mut valid = Vec::with_capacity(transactions.len());

        for tx in transactions {
            let txid_hex = HEXLOWER.encode(tx.get_id());
            // Outputs are tracked per txid, so a repeated id would shadow the first
            if recorded.txids.contains(tx.get_id()) || batch_ids.contains(tx.get_id()) {
                warn!("Dropping transaction {txid_hex}: id already recorded");
                continue;
            }
            if tx.is_coinbase() {
                if tx.output_value() != Some(BLOCK_REWARD) {
                    warn!("Dropping coinbase {txid_hex}: outputs differ from the block reward");
                    continue;
                }
                batch_ids.insert(tx.get_id().to_vec());
                valid.push(tx.clone());
                continue;
            }
            if !self.verify_transaction(tx) {
                warn!("Dropping invalid transaction {txid_hex}");
                continue;
            }
            if let Some(reason) = self.rejection_reason(tx, &recorded.spent, &claimed)? {
                warn!("Dropping transaction {txid_hex}: {reason}");
                continue;
            }

            for vin in tx.get_vin() {
                claimed.insert((vin.get_txid().to_vec(), vin.get_vout()));
            }
            batch_ids.insert(tx.get_id().to_vec());
            info!("Accepted transaction {txid_hex}");
            valid.push(tx.clone());
        }
        Ok(valid)
    }

    // Double spends and value mismatches. Signatures are checked separately.
    fn rejection_reason(
        &self,
        tx: &Transaction,
        spent_on_chain: &HashSet<(Vec<u8>, i64)>,
        claimed: &HashSet<(Vec<u8>, i64)>,
    ) -> Result<Option<String>> {
        let mut own: HashSet<(Vec<u8>, i64)> = HashSet::new();
        let mut input_value = 0u64;

        for vin in tx.get_vin() {
            let outpoint = (vin.get_txid().to_vec(), vin.get_vout());
            let label = format!("{}:{}", HEXLOWER.encode(vin.get_txid()), vin.get_vout());
            if spent_on_chain.contains(&outpoint) {
                return Ok(Some(format!("output {label} is already spent")));
            }
            if claimed.contains(&outpoint) || !own.insert(outpoint) {
                return Ok(Some(format!("output {label} is spent twice in this block")));
            }

            let prev_tx = self.find_transaction(vin.get_txid())?;
            let value = vin
                .output_index()
                .and_then(|index| prev_tx.get_vout().get(index))
                .map(TXOutput::get_value);
            input_value = match value.and_then(|v| input_value.checked_add(v)) {
                Some(total) => total,
                None => return Ok(Some(format!("output {label} cannot be spent"))),
            };
        }

        match tx.output_value() {
            Some(output_value) if output_value == input_value => Ok(None),
            Some(output_value) => Ok(Some(format!(
                "inputs carry {input_value} but outputs carry {output_value}"
            ))),
            None => Ok(Some("output value overflows".to_string())),
        }
    }

    fn recorded_state(&self) -> Result<RecordedState> {
        let mut state = RecordedState::default();
        for block in self.iter() {
            for tx in block?.get_transactions() {
                state.txids.insert(tx.get_id().to_vec());
                if tx.is_coinbase() {
                    continue;
                }
                for vin in tx.get_vin() {
                    state.spent.insert((vin.get_txid().to_vec(), vin.get_vout()));
                }
            }
        }
        Ok(state)
    }

    /// Coinbase transactions are always valid. Anything else must reference
    /// recorded transactions and carry valid signatures; lookup failures are
    /// logged and count as invalid.
    pub fn verify_transaction(&self, tx: &Transaction) -> bool {
        if tx.is_coinbase() {
            return true;
        }
        match self.prev_transactions(tx) {
            Ok(prev_txs) => tx.verify(&prev_txs),
            Err(e) => {
                error!(
                    "Transaction {} failed verification: {e}",
                    HEXLOWER.encode(tx.get_id())
                );
                false
            }
        }
    }

    /// Resolves every transaction referenced by `tx`'s inputs
    pub fn prev_transactions(&self, tx: &Transaction) -> Result<PrevTransactions> {
        let mut prev_txs = PrevTransactions::new();
        if tx.is_coinbase() {
            return Ok(prev_txs);
        }
        for vin in tx.get_vin() {
            let txid_hex = HEXLOWER.encode(vin.get_txid());
            if prev_txs.contains_key(&txid_hex) {
                continue;
            }
            let prev_tx = self.find_transaction(vin.get_txid())?;
            prev_txs.insert(txid_hex, prev_tx);
        }
        Ok(prev_txs)
    }

    pub fn sign_transaction(&self, tx: &mut Transaction, pkcs8: &[u8]) -> Result<()> {
        let prev_txs = self.prev_transactions(tx)?;
        tx.sign(pkcs8, &prev_txs)
    }

    /// Linear scan of the chain for a transaction id
    pub fn find_transaction(&self, txid: &[u8]) -> Result<Transaction> {
        for block in self.iter() {
            let block = block?;
            if let Some(tx) = block
                .get_transactions()
                .iter()
                .find(|tx| tx.get_id() == txid)
            {
                return Ok(tx.clone());
            }
        }
        Err(LedgerError::UnresolvedReference(HEXLOWER.encode(txid)))
    }

    /// Unspent outputs locked to `pub_key_hash`, in scan order: tip to genesis,
    /// transactions in block order, outputs by index.
    pub fn find_utxos(&self, pub_key_hash: &[u8]) -> Result<Vec<Utxo>> {
        let mut utxos = vec![];
        let mut spent_txos: HashMap<String, Vec<usize>> = HashMap::new();

        for block in self.iter() {
            let block = block?;
            for tx in block.get_transactions() {
                if !tx.is_coinbase() {
                    for txin in tx.get_vin() {
                        if !txin.uses_key(pub_key_hash) {
                            continue;
                        }
                        if let Some(index) = txin.output_index() {
                            spent_txos
                                .entry(HEXLOWER.encode(txin.get_txid()))
                                .or_default()
                                .push(index);
                        }
                    }
                }

                let spent = spent_txos.get(&HEXLOWER.encode(tx.get_id()));
                for (index, out) in tx.get_vout().iter().enumerate() {
                    if spent.is_some_and(|indexes| indexes.contains(&index)) {
                        continue;
                    }
                    if out.is_locked_with_key(pub_key_hash) {
                        utxos.push(Utxo {
                            txid: tx.get_id().to_vec(),
                            index,
                            output: out.clone(),
                        });
                    }
                }
            }
        }
        Ok(utxos)
    }

    /// First-fit selection in scan order, stopping as soon as the running
    /// total reaches `amount`. The total may overshoot.
    pub fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> Result<(Vec<Utxo>, u64)> {
        let mut selected = vec![];
        let mut accumulated = 0u64;
        for utxo in self.find_utxos(pub_key_hash)? {
            accumulated = accumulated
                .checked_add(utxo.output.get_value())
                .ok_or_else(|| LedgerError::Transaction("Balance overflow".to_string()))?;
            selected.push(utxo);
            if accumulated >= amount {
                break;
            }
        }
        Ok((selected, accumulated))
    }

    pub fn get_balance(&self, address: &str) -> Result<u64> {
        let pub_key_hash = address_to_pub_key_hash(address)?;
        self.find_utxos(&pub_key_hash)?
            .iter()
            .try_fold(0u64, |total, utxo| total.checked_add(utxo.output.get_value()))
            .ok_or_else(|| LedgerError::Transaction("Balance overflow".to_string()))
    }

    /// Re-validates every stored block: proof-of-work, Merkle root, recorded
    /// signatures, and that each block sits under the hash it was reached by.
    /// Returns the block count.
    pub fn verify_chain(&self) -> Result<usize> {
        let mut expected_hash = self.tip.clone();
        let mut count = 0;
        for block in self.iter() {
            let block = block?;
            let hash_hex = HEXLOWER.encode(block.get_hash());
            if block.get_hash() != expected_hash.as_slice() {
                return Err(LedgerError::InvalidBlock(format!(
                    "Block {hash_hex} stored under {}",
                    HEXLOWER.encode(&expected_hash)
                )));
            }
            if !ProofOfWork::validate(&block) {
                return Err(LedgerError::InvalidBlock(format!(
                    "Block {hash_hex} fails proof-of-work"
                )));
            }
            if !block.verify_merkle_root() {
                return Err(LedgerError::InvalidBlock(format!(
                    "Block {hash_hex} has a wrong Merkle root"
                )));
            }
            for tx in block.get_transactions() {
                if !self.verify_transaction(tx) {
                    return Err(LedgerError::InvalidSignature(format!(
                        "Transaction {} in block {hash_hex}",
                        HEXLOWER.encode(tx.get_id())
                    )));
                }
            }
            expected_hash = block.get_prev_hash().to_vec();
            count += 1;
        }
        Ok(count)
    }
}

/// One-shot walk from a tip back to genesis
pub struct LedgerIterator {
    store: BlockStore,
    next_hash: Option<Vec<u8>>,
}

impl Iterator for LedgerIterator {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next_hash.take()?;
        match self.store.get_block(&hash) {
            Ok(Some(block)) => {
                if !block.is_genesis() {
                    self.next_hash = Some(block.get_prev_hash().to_vec());
                }
                Some(Ok(block))
            }
            Ok(None) => Some(Err(LedgerError::Database(format!(
                "Block {} missing from store",
                HEXLOWER.encode(&hash)
            )))),
            Err(e) => Some(Err(e)),
        }
    }
}
