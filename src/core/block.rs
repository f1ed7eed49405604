use crate::core::proof_of_work::BlockHeader;
use crate::core::{ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp, deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;

pub const BLOCK_VERSION: u64 = 0;

/// A sealed block. Fields are private so a block cannot change after sealing.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Block {
    version: u64,
    prev_hash: Vec<u8>,
    merkle_root: Vec<u8>,
    timestamp: u64,
    difficulty: u32,
    nonce: u64,
    hash: Vec<u8>,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Builds and seals a block on top of `prev_hash` (empty for genesis)
    pub fn new_block(
        transactions: &[Transaction],
        prev_hash: &[u8],
        difficulty: u32,
    ) -> Result<Block> {
        let never = AtomicBool::new(false);
        Self::new_block_cancellable(transactions, prev_hash, difficulty, &never)
    }

    pub fn new_block_cancellable(
        transactions: &[Transaction],
        prev_hash: &[u8],
        difficulty: u32,
        cancel: &AtomicBool,
    ) -> Result<Block> {
        if transactions.is_empty() {
            return Err(LedgerError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        let mut block = Block {
            version: BLOCK_VERSION,
            prev_hash: prev_hash.to_vec(),
            merkle_root: Self::hash_transactions(transactions),
            timestamp: current_timestamp()?,
            difficulty,
            nonce: 0,
            hash: vec![],
            transactions: transactions.to_vec(),
        };

        let pow = ProofOfWork::new(block.header())?;
        let (hash, nonce) = pow.run_cancellable(cancel).ok_or_else(|| {
            LedgerError::Mining("Proof-of-work search was cancelled".to_string())
        })?;
        block.hash = hash;
        block.nonce = nonce;
        info!(
            "Sealed block {} with {} transactions (difficulty {difficulty}, nonce {nonce})",
            HEXLOWER.encode(&block.hash),
            block.transactions.len()
        );

        Ok(block)
    }

    /// Simulated Merkle root: SHA-256 over the concatenated transaction ids
    pub fn hash_transactions(transactions: &[Transaction]) -> Vec<u8> {
        let mut txhashs = vec![];
        for transaction in transactions {
            txhashs.extend(transaction.get_id());
        }
        sha256_digest(txhashs.as_slice())
    }

    pub fn verify_merkle_root(&self) -> bool {
        Self::hash_transactions(&self.transactions) == self.merkle_root
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            version: self.version,
            prev_hash: self.prev_hash.clone(),
            merkle_root: self.merkle_root.clone(),
            timestamp: self.timestamp,
            difficulty: self.difficulty,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
            .map_err(|e| LedgerError::MalformedData(format!("Malformed block: {e}")))
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_version(&self) -> u64 {
        self.version
    }

    pub fn get_prev_hash(&self) -> &[u8] {
        self.prev_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_merkle_root(&self) -> &[u8] {
        self.merkle_root.as_slice()
    }

    pub fn get_timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn coinbase() -> Transaction {
        let miner = Wallet::new().unwrap();
        Transaction::new_coinbase_tx(&miner.get_pub_key_hash(), b"block test").unwrap()
    }

    #[test]
    fn test_new_block_is_sealed() {
        let block = Block::new_block(&[coinbase()], &[], 6).unwrap();

        assert!(block.is_genesis());
        assert_eq!(block.get_difficulty(), 6);
        assert!(ProofOfWork::validate(&block));
        assert!(block.verify_merkle_root());
    }

    #[test]
    fn test_merkle_root_is_hash_of_concatenated_ids() {
        let first = coinbase();
        let second = coinbase();
        let block = Block::new_block(&[first.clone(), second.clone()], b"prev", 2).unwrap();

        let mut ids = first.get_id().to_vec();
        ids.extend(second.get_id());
        assert_eq!(block.get_merkle_root(), sha256_digest(&ids).as_slice());
    }

    #[test]
    fn test_empty_block_is_rejected() {
        assert!(matches!(
            Block::new_block(&[], &[], 1),
            Err(LedgerError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_serialization_round_trip() {
        let block = Block::new_block(&[coinbase(), coinbase()], b"previous hash", 4).unwrap();
        let bytes = block.serialize().unwrap();
        let decoded = Block::deserialize(&bytes).unwrap();

        assert_eq!(decoded, block);
        assert!(ProofOfWork::validate(&decoded));
    }

    #[test]
    fn test_corrupt_bytes_are_malformed_data() {
        let block = Block::new_block(&[coinbase()], &[], 1).unwrap();
        let bytes = block.serialize().unwrap();

        assert!(matches!(
            Block::deserialize(&bytes[..bytes.len() / 2]),
            Err(LedgerError::MalformedData(_))
        ));
        assert!(matches!(
            Block::deserialize(&[0xFF; 7]),
            Err(LedgerError::MalformedData(_))
        ));
    }

    #[test]
    fn test_hostile_length_prefix_is_malformed_data() {
        // version 0, then a prev_hash claiming 2^60 bytes
        for claimed in [1u64 << 60, 1u64 << 36] {
            let mut bytes = vec![0u8, 253];
            bytes.extend(claimed.to_le_bytes());
            assert!(matches!(
                Block::deserialize(&bytes),
                Err(LedgerError::MalformedData(_))
            ));
        }
    }

    #[test]
    fn test_tampered_nonce_fails_validation() {
        let block = Block::new_block(&[coinbase()], &[], 8).unwrap();
        let mut tampered = block.clone();
        tampered.nonce += 1;
        assert!(!ProofOfWork::validate(&tampered));
    }

    #[test]
    fn test_cancelled_sealing_is_mining_error() {
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            Block::new_block_cancellable(&[coinbase()], &[], 200, &cancel),
            Err(LedgerError::Mining(_))
        ));
    }
}
