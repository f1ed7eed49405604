//! Core ledger functionality
//!
//! Blocks, transactions, proof-of-work sealing and the ledger that chains
//! them together and answers balance queries.

pub mod block;
pub mod ledger;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use ledger::{Ledger, LedgerIterator, Utxo, GENESIS_DATA};
pub use monetary::{coins_to_units, units_to_coins, BLOCK_REWARD, UNITS_PER_COIN};
pub use proof_of_work::{BlockHeader, ProofOfWork};
pub use transaction::{PrevTransactions, TXInput, TXOutput, Transaction};
