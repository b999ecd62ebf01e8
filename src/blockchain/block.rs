use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::difficulty::HashTarget;
use super::transaction::Transaction;

/// Previous-hash value carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Computes the SHA-256 hash of the block contents as a hexadecimal string
fn calculate_hash(
    previous_hash: &str,
    timestamp: &DateTime<Utc>,
    transactions: &[Transaction],
    nonce: u64,
) -> String {
    let mut hasher = Sha256::new();

    write_str(&mut hasher, previous_hash);
    write_str(
        &mut hasher,
        &timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
    );

    hasher.update((transactions.len() as u64).to_le_bytes());
    for transaction in transactions {
        transaction.write_canonical(&mut hasher);
    }

    hasher.update(nonce.to_le_bytes());

    hex::encode(hasher.finalize())
}

fn write_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// A block that has not been sealed yet.
///
/// Its nonce and hash change while [`CandidateBlock::seal`] searches for a
/// hash meeting the target. Sealing consumes the candidate.
#[derive(Debug, Clone)]
pub struct CandidateBlock {
    timestamp: DateTime<Utc>,
    transactions: Vec<Transaction>,
    previous_hash: String,
    nonce: u64,
    hash: String,
}

impl CandidateBlock {
    /// Creates a candidate with nonce 0 and its initial hash
    pub fn new(
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        previous_hash: impl Into<String>,
    ) -> Self {
        let previous_hash = previous_hash.into();
        let hash = calculate_hash(&previous_hash, &timestamp, &transactions, 0);

        CandidateBlock {
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash,
        }
    }

    /// Nonce the current hash was computed with
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Calculates the hash of the candidate
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block contents as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        calculate_hash(
            &self.previous_hash,
            &self.timestamp,
            &self.transactions,
            self.nonce,
        )
    }

    /// Searches nonces upward from the current one until the hash meets `target`.
    ///
    /// Blocks the calling thread until a match is found.
    pub fn seal<T: HashTarget + ?Sized>(mut self, target: &T) -> Block {
        let start = self.nonce;

        while !target.is_met_by(&self.hash) {
            self.nonce += 1;
            self.hash = self.calculate_hash();
        }

        debug!(
            "Sealed block {} after {} attempts (nonce {})",
            self.hash,
            self.nonce - start + 1,
            self.nonce
        );

        self.into_block()
    }

    /// Freezes the candidate as-is without any proof-of-work
    fn into_block(self) -> Block {
        Block {
            timestamp: self.timestamp,
            transactions: self.transactions,
            previous_hash: self.previous_hash,
            nonce: self.nonce,
            hash: self.hash,
        }
    }
}

/// A sealed block in the chain.
///
/// Fields are read-only; the only way to obtain a `Block` is by sealing a
/// [`CandidateBlock`], building the genesis block, or deserializing an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Time the block was assembled
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    timestamp: DateTime<Utc>,

    /// Transactions in the order they were submitted
    transactions: Vec<Transaction>,

    /// Hash of the previous block, `"0"` for genesis
    previous_hash: String,

    /// Proof of work
    nonce: u64,

    /// Hash of this block
    hash: String,
}

impl Block {
    /// Builds the fixed first block of every chain. It is never mined.
    pub fn genesis() -> Self {
        let timestamp = Utc
            .with_ymd_and_hms(2019, 2, 5, 0, 0, 0)
            .single()
            .unwrap_or_default();

        CandidateBlock::new(timestamp, Vec::new(), GENESIS_PREVIOUS_HASH).into_block()
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Hash of the block this one links to
    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// Proof of work found while sealing
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Hash stored when the block was sealed
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Recomputes the hash from the stored fields
    pub fn calculate_hash(&self) -> String {
        calculate_hash(
            &self.previous_hash,
            &self.timestamp,
            &self.transactions,
            self.nonce,
        )
    }

    /// Whether the stored hash matches the block contents
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::difficulty::Difficulty;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn sample_transactions() -> Vec<Transaction> {
        vec![
            Transaction::reward("alice", 12.5),
            Transaction::transfer("bob", "alice", 10.0),
        ]
    }

    #[test]
    fn test_new_candidate() {
        let candidate = CandidateBlock::new(fixed_time(), sample_transactions(), "previous_hash");

        assert_eq!(candidate.nonce(), 0);
        assert_eq!(candidate.hash().len(), 64); // SHA-256 hash is 64 characters in hex
        assert_eq!(candidate.hash(), candidate.calculate_hash());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = CandidateBlock::new(fixed_time(), sample_transactions(), "prev");
        let b = CandidateBlock::new(fixed_time(), sample_transactions(), "prev");

        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.calculate_hash(), a.calculate_hash());
    }

    #[test]
    fn test_hash_depends_on_every_field() {
        let base = CandidateBlock::new(fixed_time(), sample_transactions(), "prev");

        let other_prev = CandidateBlock::new(fixed_time(), sample_transactions(), "other");
        assert_ne!(base.hash(), other_prev.hash());

        let later = fixed_time() + chrono::Duration::nanoseconds(1);
        let other_time = CandidateBlock::new(later, sample_transactions(), "prev");
        assert_ne!(base.hash(), other_time.hash());

        let mut reordered = sample_transactions();
        reordered.reverse();
        let other_order = CandidateBlock::new(fixed_time(), reordered, "prev");
        assert_ne!(base.hash(), other_order.hash());

        let mut bumped = base.clone();
        bumped.nonce = 1;
        assert_ne!(base.hash(), bumped.calculate_hash());
    }

    #[test]
    fn test_seal_meets_difficulty() {
        let difficulty = Difficulty::new(8);
        let block = CandidateBlock::new(fixed_time(), sample_transactions(), "prev").seal(&difficulty);

        assert!(difficulty.is_met_by(block.hash()));
        assert!(block.has_valid_hash());
    }

    #[test]
    fn test_seal_finds_smallest_nonce() {
        let difficulty = Difficulty::new(6);
        let candidate = CandidateBlock::new(fixed_time(), sample_transactions(), "prev");
        let block = candidate.clone().seal(&difficulty);

        for nonce in 0..block.nonce() {
            let mut probe = candidate.clone();
            probe.nonce = nonce;
            assert!(!difficulty.is_met_by(&probe.calculate_hash()));
        }
    }

    #[test]
    fn test_seal_is_reproducible() {
        let difficulty = Difficulty::new(8);
        let candidate = CandidateBlock::new(fixed_time(), sample_transactions(), "prev");

        let first = candidate.clone().seal(&difficulty);
        let second = candidate.seal(&difficulty);

        assert_eq!(first, second);
    }

    #[test]
    fn test_seal_with_prefix_closure() {
        let block = CandidateBlock::new(fixed_time(), Vec::new(), "prev")
            .seal(&|hash: &str| hash.starts_with("00"));

        assert!(block.hash().starts_with("00"));
    }

    #[test]
    fn test_zero_difficulty_keeps_initial_nonce() {
        let candidate = CandidateBlock::new(fixed_time(), Vec::new(), "prev");
        let initial_hash = candidate.hash().to_string();
        let block = candidate.seal(&Difficulty::new(0));

        assert_eq!(block.nonce(), 0);
        assert_eq!(block.hash(), initial_hash);
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();

        assert_eq!(genesis.previous_hash(), GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions().is_empty());
        assert_eq!(genesis.nonce(), 0);
        assert!(genesis.has_valid_hash());
        assert_eq!(genesis, Block::genesis());
    }

    #[test]
    fn test_tampered_block_detected() {
        let mut block = CandidateBlock::new(fixed_time(), sample_transactions(), "prev")
            .seal(&Difficulty::new(4));
        assert!(block.has_valid_hash());

        block.transactions[1] = Transaction::transfer("bob", "alice", 1000.0);
        assert!(!block.has_valid_hash());
    }

    #[test]
    fn test_export_round_trip_preserves_hash() {
        let block = CandidateBlock::new(Utc::now(), sample_transactions(), "prev")
            .seal(&Difficulty::new(4));

        let json = serde_json::to_string(&block).unwrap();
        let imported: Block = serde_json::from_str(&json).unwrap();

        assert_eq!(imported, block);
        assert!(imported.has_valid_hash());
    }
}
