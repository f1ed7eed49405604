use crate::core::Block;
use crate::error::{LedgerError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use log::{debug, info};
use num_bigint::BigUint;
use std::sync::atomic::{AtomicBool, Ordering};

/// Difficulty is a count of leading zero bits, so it must stay below the hash width
pub const MAX_DIFFICULTY: u32 = 256;

// How many nonces to try between looks at the cancel flag
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Everything the seal commits to except the nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u64,
    pub prev_hash: Vec<u8>,
    pub merkle_root: Vec<u8>,
    pub timestamp: u64,
    pub difficulty: u32,
}

pub struct ProofOfWork {
    header: BlockHeader,
    target: BigUint,
}

impl ProofOfWork {
    pub fn new(header: BlockHeader) -> Result<ProofOfWork> {
        let target = Self::target_for(header.difficulty)?;
        Ok(ProofOfWork { header, target })
    }

    /// `1 << (256 - difficulty)`
    pub fn target_for(difficulty: u32) -> Result<BigUint> {
        if difficulty >= MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "Difficulty {difficulty} must be below {MAX_DIFFICULTY}"
            )));
        }
        Ok(BigUint::from(1u32) << (MAX_DIFFICULTY - difficulty) as usize)
    }

    pub fn target(&self) -> &BigUint {
        &self.target
    }

    /// Recomputes the hash from the block's stored nonce. The block is valid
    /// when that hash matches the stored one and sits below the target.
    pub fn validate(block: &Block) -> bool {
        let pow = match ProofOfWork::new(block.header()) {
            Ok(pow) => pow,
            Err(_) => return false,
        };
        let hash = sha256_digest(pow.prepare_data(block.get_nonce()).as_slice());
        hash.as_slice() == block.get_hash() && pow.meets_target(&hash)
    }

    fn meets_target(&self, hash: &[u8]) -> bool {
        BigUint::from_bytes_be(hash) < self.target
    }

    fn prepare_data(&self, nonce: u64) -> Vec<u8> {
        let header = &self.header;
        let mut data_bytes = Vec::with_capacity(
            32 + header.prev_hash.len() + header.merkle_root.len(),
        );
        data_bytes.extend(header.version.to_be_bytes());
        data_bytes.extend(header.prev_hash.as_slice());
        data_bytes.extend(header.merkle_root.as_slice());
        data_bytes.extend(header.timestamp.to_be_bytes());
        data_bytes.extend(u64::from(header.difficulty).to_be_bytes());
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    /// Searches nonces from zero until the hash is below the target, giving
    /// up with `None` once `cancel` is set. There is no other upper bound.
    pub fn run_cancellable(&self, cancel: &AtomicBool) -> Option<(Vec<u8>, u64)> {
        let mut nonce: u64 = 0;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                info!("Proof-of-work cancelled after {nonce} attempts");
                return None;
            }
            if let Some(hash) = self.try_nonce(nonce) {
                return Some((hash, nonce));
            }
            nonce += 1;
        }
    }

    fn try_nonce(&self, nonce: u64) -> Option<Vec<u8>> {
        let hash = sha256_digest(self.prepare_data(nonce).as_slice());
        if self.meets_target(&hash) {
            debug!(
                "Sealed block on {} with nonce {nonce}: {}",
                HEXLOWER.encode(&self.header.prev_hash),
                HEXLOWER.encode(&hash)
            );
            return Some(hash);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seal(pow: &ProofOfWork) -> (Vec<u8>, u64) {
        pow.run_cancellable(&AtomicBool::new(false)).unwrap()
    }

    fn test_header(difficulty: u32) -> BlockHeader {
        BlockHeader {
            version: 0,
            prev_hash: vec![],
            merkle_root: sha256_digest(b"transactions"),
            timestamp: 1_700_000_000,
            difficulty,
        }
    }

    #[test]
    fn test_run_meets_target() {
        let pow = ProofOfWork::new(test_header(8)).unwrap();
        let (hash, nonce) = seal(&pow);

        assert_eq!(hash, sha256_digest(&pow.prepare_data(nonce)));
        assert!(BigUint::from_bytes_be(&hash) < *pow.target());
    }

    #[test]
    fn test_run_is_deterministic() {
        let pow = ProofOfWork::new(test_header(6)).unwrap();
        assert_eq!(seal(&pow), seal(&pow));
    }

    #[test]
    fn test_higher_difficulty_has_smaller_target() {
        let easy = ProofOfWork::target_for(1).unwrap();
        let hard = ProofOfWork::target_for(2).unwrap();
        assert!(hard < easy);
        assert_eq!(easy, hard * 2u32);
    }

    #[test]
    fn test_harder_target_accepts_subset_of_nonces() {
        let easy = ProofOfWork::new(test_header(2)).unwrap();
        let hard = ProofOfWork::new(test_header(4)).unwrap();
        let mut hard_hits = 0;
        let mut easy_hits = 0;
        for nonce in 0..512u64 {
            let hash = sha256_digest(&hard.prepare_data(nonce));
            if hard.meets_target(&hash) {
                hard_hits += 1;
                assert!(easy.meets_target(&hash));
            }
            if easy.meets_target(&hash) {
                easy_hits += 1;
            }
        }
        assert!(hard_hits <= easy_hits);
    }

    #[test]
    fn test_difficulty_out_of_range_is_config_error() {
        assert!(matches!(
            ProofOfWork::new(test_header(256)),
            Err(LedgerError::Config(_))
        ));
        assert!(ProofOfWork::target_for(255).is_ok());
    }

    #[test]
    fn test_zero_difficulty_accepts_first_nonce() {
        let pow = ProofOfWork::new(test_header(0)).unwrap();
        let (_, nonce) = seal(&pow);
        assert_eq!(nonce, 0);
    }

    #[test]
    fn test_cancelled_search_returns_none() {
        let pow = ProofOfWork::new(test_header(255)).unwrap();
        let cancel = AtomicBool::new(true);
        assert!(pow.run_cancellable(&cancel).is_none());
    }

    #[test]
    fn test_prepare_data_layout() {
        let header = test_header(3);
        let pow = ProofOfWork::new(header.clone()).unwrap();
        let data = pow.prepare_data(12345);

        assert_eq!(data.len(), 8 + header.merkle_root.len() + 8 + 8 + 8);
        assert_eq!(&data[data.len() - 8..], &12345u64.to_be_bytes());
        assert_ne!(data, pow.prepare_data(54321));
    }
}
