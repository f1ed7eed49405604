//! Wallet management
//!
//! Key pair generation, address derivation and validation, and the on-disk
//! wallet file.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{
    address_to_pub_key_hash, convert_address, validate_address, Wallet, ADDRESS_PAYLOAD_LEN,
    PUB_KEY_HASH_LEN,
};
pub use wallets::{Wallets, WALLET_FILE};
