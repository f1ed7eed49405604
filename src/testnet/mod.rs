//! Helpers shared by the unit tests: throwaway ledgers on temp directories
//! and hand-built transactions.

pub mod test_utils;
