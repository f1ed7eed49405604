//! Data storage and persistence
//!
//! Blocks are persisted in a sled database; nothing else about the ledger is
//! stored, unspent outputs are always recomputed from the chain.

pub mod block_store;

pub use block_store::BlockStore;
