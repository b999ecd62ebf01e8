//! A single-writer, in-memory ledger of hash-linked blocks sealed by proof of work.
//!
//! ```
//! use hashchain::blockchain::{Address, Blockchain, Transaction};
//!
//! let mut chain = Blockchain::default();
//! chain.create_transaction(Transaction::transfer("alice", "bob", 10.0)).unwrap();
//! chain.mine_pending_transactions(&Address::from("miner"));
//!
//! assert_eq!(chain.balance_of(&Address::from("bob")), 10.0);
//! assert!(chain.is_valid());
//! ```

pub mod api;
pub mod blockchain;
pub mod config;
