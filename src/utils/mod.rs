//! Utility functions and helpers
//!
//! Hashing, base58, raw-encoded ECDSA P-256 and the bincode wrapper used
//! for every persisted structure.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_decode, base58_encode, current_timestamp, double_sha256_checksum, ecdsa_sign,
    ecdsa_verify, hash_pub_key, new_key_pair, public_key_xy, ripemd160_digest, sha256_digest,
    CHECKSUM_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN,
};

pub use serialization::{deserialize, serialize};
