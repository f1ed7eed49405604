//! # UTXO Ledger
//!
//! A local, single-writer ledger of value transfers. Blocks are sealed with
//! proof-of-work, chained by hash and stored in a sled database; transfers
//! follow the UTXO model and are signed with ECDSA P-256.
//!
//! ## Layout
//! - `core/`: blocks, transactions, proof-of-work and the [`Ledger`] handle
//! - `storage/`: the sled block store (blocks keyed by hash plus the tip)
//! - `wallet/`: key pairs, addresses and the wallet file
//! - `utils/`: hashing, base58, ECDSA primitives and the bincode wrapper
//! - `config/`: storage paths and difficulty from defaults, TOML and env
//! - `error/`: the crate-wide [`LedgerError`]
//! - `cli/`: clap definitions for the binary
//!
//! ## Things to keep in mind
//! - There is no UTXO index. Balances and coin selection walk the whole
//!   chain from tip to genesis, so they cost O(chain length).
//! - A ledger is an explicit handle: `create`/`open`, use, `close`. Nothing is
//!   process-global.
//! - Amounts are `u64` base units, 100,000,000 per coin.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use cli::{Command, Opt};
pub use config::Config;
pub use core::{
    coins_to_units, units_to_coins, Block, Ledger, LedgerIterator, ProofOfWork, TXInput,
    TXOutput, Transaction, Utxo, BLOCK_REWARD, UNITS_PER_COIN,
};
pub use error::{LedgerError, Result};
pub use storage::BlockStore;
pub use utils::{base58_decode, base58_encode, hash_pub_key, sha256_digest};
pub use wallet::{
    address_to_pub_key_hash, convert_address, validate_address, Wallet, Wallets,
};
