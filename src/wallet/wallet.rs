use crate::error::{LedgerError, Result};
use crate::utils::{
    base58_decode, base58_encode, double_sha256_checksum, hash_pub_key, new_key_pair,
    public_key_xy, CHECKSUM_LEN,
};
use serde::{Deserialize, Serialize};

const VERSION: u8 = 0x00;
pub const PUB_KEY_HASH_LEN: usize = 20;
/// version + public key hash + checksum
pub const ADDRESS_PAYLOAD_LEN: usize = 1 + PUB_KEY_HASH_LEN + CHECKSUM_LEN;

/// An ECDSA P-256 key pair. The private half stays PKCS#8 encoded, the public
/// half is kept as raw X||Y bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        let public_key = public_key_xy(&pkcs8)?;
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn get_address(&self) -> String {
        convert_address(hash_pub_key(self.public_key.as_slice()).as_slice())
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_pub_key_hash(&self) -> Vec<u8> {
        hash_pub_key(self.public_key.as_slice())
    }

    pub fn get_pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }
}

// Keep private key bytes out of logs
impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.get_address())
            .finish_non_exhaustive()
    }
}

pub fn validate_address(address: &str) -> bool {
    let payload = match base58_decode(address) {
        Ok(payload) => payload,
        Err(_) => return false,
    };
    if payload.len() != ADDRESS_PAYLOAD_LEN {
        return false;
    }

    let (body, actual_checksum) = payload.split_at(payload.len() - CHECKSUM_LEN);
    double_sha256_checksum(body).as_slice() == actual_checksum
}

/// Extracts the 20-byte public key hash from a checked address
pub fn address_to_pub_key_hash(address: &str) -> Result<Vec<u8>> {
    if !validate_address(address) {
        return Err(LedgerError::InvalidAddress(address.to_string()));
    }
    let payload = base58_decode(address)?;
    Ok(payload[1..payload.len() - CHECKSUM_LEN].to_vec())
}

pub fn convert_address(pub_key_hash: &[u8]) -> String {
    let mut payload: Vec<u8> = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
    payload.push(VERSION);
    payload.extend(pub_key_hash);
    let checksum = double_sha256_checksum(payload.as_slice());
    payload.extend(checksum.as_slice());
    base58_encode(payload.as_slice())
}
