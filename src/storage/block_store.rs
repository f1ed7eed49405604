// Durable block storage on sled. Blocks live in their own tree keyed by raw
// hash; a reserved key in the same tree points at the tip.

use crate::core::Block;
use crate::error::{LedgerError, Result};
use sled::{Db, Tree};
use std::path::Path;

const TIP_BLOCK_HASH_KEY: &str = "tip_block_hash";
const BLOCKS_TREE: &str = "blocks";

#[derive(Clone)]
pub struct BlockStore {
    db: Db,
    blocks: Tree,
}

impl BlockStore {
    /// True when a ledger has already been written at `path`
    pub fn exists(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let store = Self::open_at(path)?;
        Ok(store.tip()?.is_some())
    }

    /// Opens an empty store at `path`, failing if a ledger already lives there
    pub fn create(path: &Path) -> Result<BlockStore> {
        let store = Self::open_at(path)?;
        if store.tip()?.is_some() {
            return Err(LedgerError::Config(format!(
                "A ledger already exists at {}",
                path.display()
            )));
        }
        Ok(store)
    }

    /// Opens the store of an existing ledger
    pub fn open(path: &Path) -> Result<BlockStore> {
        if !path.exists() {
            return Err(LedgerError::Config(format!(
                "No ledger found at {}. Create one first.",
                path.display()
            )));
        }
        let store = Self::open_at(path)?;
        if store.tip()?.is_none() {
            return Err(LedgerError::Config(format!(
                "No ledger found at {}. Create one first.",
                path.display()
            )));
        }
        Ok(store)
    }

    fn open_at(path: &Path) -> Result<BlockStore> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Database(format!("Failed to open database: {e}")))?;
        let blocks = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open blocks tree: {e}")))?;
        Ok(BlockStore { db, blocks })
    }

    pub fn tip(&self) -> Result<Option<Vec<u8>>> {
        let tip = self
            .blocks
            .get(TIP_BLOCK_HASH_KEY)
            .map_err(|e| LedgerError::Database(format!("Failed to get tip hash: {e}")))?;
        Ok(tip.map(|hash| hash.to_vec()))
    }

    pub fn get_block(&self, hash: &[u8]) -> Result<Option<Block>> {
        let bytes = self
            .blocks
            .get(hash)
            .map_err(|e| LedgerError::Database(format!("Failed to get block: {e}")))?;
        bytes.map(|bytes| Block::deserialize(bytes.as_ref())).transpose()
    }

    /// Stores `block` under its hash and makes it the tip in one transaction
    pub fn put_tip_block(&self, block: &Block) -> Result<()> {
        let block_hash = block.get_hash();
        let block_data = block.serialize()?;

        self.blocks
            .transaction(|tx_db| {
                tx_db.insert(block_hash, block_data.as_slice())?;
                tx_db.insert(TIP_BLOCK_HASH_KEY, block_hash)?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError| {
                LedgerError::Database(format!("Failed to update blocks tree: {e}"))
            })?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use tempfile::tempdir;

    fn sealed_block(prev_hash: &[u8]) -> Block {
        let coinbase = Transaction::new_coinbase_tx(&[1u8; 20], b"").unwrap();
        Block::new_block(&[coinbase], prev_hash, 1).unwrap()
    }

    #[test]
    fn test_open_missing_store_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing");
        assert!(matches!(BlockStore::open(&path), Err(LedgerError::Config(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_put_and_get_tip_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        let store = BlockStore::create(&path).unwrap();
        assert_eq!(store.tip().unwrap(), None);

        let genesis = sealed_block(&[]);
        store.put_tip_block(&genesis).unwrap();
        assert_eq!(store.tip().unwrap(), Some(genesis.get_hash().to_vec()));
        assert_eq!(store.get_block(genesis.get_hash()).unwrap(), Some(genesis));
        assert_eq!(store.get_block(b"unknown").unwrap(), None);
    }

    #[test]
    fn test_create_twice_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        {
            let store = BlockStore::create(&path).unwrap();
            store.put_tip_block(&sealed_block(&[])).unwrap();
            store.flush().unwrap();
        }
        assert!(BlockStore::exists(&path).unwrap());
        assert!(matches!(
            BlockStore::create(&path),
            Err(LedgerError::Config(_))
        ));
    }
}
