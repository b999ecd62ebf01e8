// Blockchain module
//
// This module contains the core ledger implementation:
// - Transaction structure
// - Block structure (unsealed candidate and sealed block)
// - Difficulty predicate used by proof of work
// - Blockchain structure

pub mod block;
pub mod chain;
pub mod difficulty;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, CandidateBlock};
pub use chain::{Blockchain, BlockchainError, IntegrityFault};
pub use difficulty::{Difficulty, HashTarget};
pub use transaction::{Address, Transaction, TransactionError};
