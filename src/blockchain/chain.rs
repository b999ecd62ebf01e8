use chrono::Utc;
use log::{info, warn};
use thiserror::Error;

use super::block::{Block, CandidateBlock};
use super::difficulty::Difficulty;
use super::transaction::{Address, Transaction, TransactionError};
use crate::config::{ChainConfig, RewardPolicy};

/// Errors that can occur during blockchain operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockchainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("A chain needs at least the genesis block")]
    EmptyChain,
}

/// The first integrity break found in a chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityFault {
    #[error("Block {index} has hash {stored} but its contents hash to {computed}")]
    HashMismatch {
        index: usize,
        stored: String,
        computed: String,
    },

    #[error("Block {index} links to {found} but the previous block hash is {expected}")]
    LinkBroken {
        index: usize,
        expected: String,
        found: String,
    },
}

impl IntegrityFault {
    /// Position of the offending block
    pub fn index(&self) -> usize {
        match self {
            IntegrityFault::HashMismatch { index, .. } | IntegrityFault::LinkBroken { index, .. } => {
                *index
            }
        }
    }
}

/// Represents the blockchain.
///
/// Owns the sealed blocks and the pending transaction buffer. Blocks can only
/// be added through [`Blockchain::mine_pending_transactions`].
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks, genesis first
    chain: Vec<Block>,

    /// Transactions waiting to be included in the next block
    pending_transactions: Vec<Transaction>,

    /// Mining difficulty
    difficulty: Difficulty,

    /// Mining reward
    mining_reward: f64,

    /// When mining rewards are credited
    reward_policy: RewardPolicy,
}

impl Default for Blockchain {
    fn default() -> Self {
        Blockchain::new(ChainConfig::default())
    }
}

impl Blockchain {
    /// Creates a new blockchain holding only the genesis block
    pub fn new(config: ChainConfig) -> Self {
        Blockchain {
            chain: vec![Self::create_genesis_block()],
            pending_transactions: Vec::new(),
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            reward_policy: config.reward_policy,
        }
    }

    /// Restores a chain from previously exported blocks.
    ///
    /// The blocks are taken as-is; call [`Blockchain::verify`] to check them.
    pub fn from_blocks(blocks: Vec<Block>, config: ChainConfig) -> Result<Self, BlockchainError> {
        if blocks.is_empty() {
            return Err(BlockchainError::EmptyChain);
        }

        let blockchain = Blockchain {
            chain: blocks,
            ..Blockchain::new(config)
        };

        if let Err(fault) = blockchain.verify() {
            warn!("Imported chain is not intact: {}", fault);
        }

        Ok(blockchain)
    }

    fn create_genesis_block() -> Block {
        Block::genesis()
    }

    /// Gets the last block in the chain
    pub fn latest_block(&self) -> &Block {
        self.chain
            .last()
            .expect("blockchain always contains the genesis block")
    }

    /// All sealed blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Gets the number of blocks, genesis included
    ///
    /// # Returns
    ///
    /// The chain length, at least 1
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// A chain always holds its genesis block, so this is false
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Gets all pending transactions
    ///
    /// # Returns
    ///
    /// The transactions that the next call to
    /// [`Blockchain::mine_pending_transactions`] will seal, in submission order
    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    /// Difficulty every new block is mined at
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Amount credited to the miner of each block
    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    pub fn reward_policy(&self) -> RewardPolicy {
        self.reward_policy
    }

    /// Adds a new transaction to the pending transactions
    ///
    /// # Arguments
    ///
    /// * `transaction` - The transaction to queue
    ///
    /// # Returns
    ///
    /// `TransactionError::InvalidAmount` for a negative or non-finite amount
    pub fn create_transaction(&mut self, transaction: Transaction) -> Result<(), BlockchainError> {
        transaction.validate()?;
        self.pending_transactions.push(transaction);
        Ok(())
    }

    /// Seals the pending transactions into a new block and appends it.
    ///
    /// With [`RewardPolicy::Deferred`] the reward for `reward_address` becomes
    /// the only pending transaction and is credited once the next block is
    /// mined. With [`RewardPolicy::Immediate`] it is sealed into this block.
    pub fn mine_pending_transactions(&mut self, reward_address: &Address) -> &Block {
        let reward = Transaction::reward(reward_address.clone(), self.mining_reward);

        let mut transactions = std::mem::take(&mut self.pending_transactions);
        if self.reward_policy == RewardPolicy::Immediate {
            transactions.push(reward.clone());
        }

        let transaction_count = transactions.len();
        let candidate = CandidateBlock::new(
            Utc::now(),
            transactions,
            self.latest_block().hash(),
        );

        let block = candidate.seal(&self.difficulty);
        info!(
            "Mined block {} with {} transactions: {}",
            self.chain.len(),
            transaction_count,
            block.hash()
        );

        self.chain.push(block);

        if self.reward_policy == RewardPolicy::Deferred {
            self.pending_transactions.push(reward);
        }

        self.latest_block()
    }

    /// Replays every mined transaction to compute the balance of `address`
    ///
    /// # Arguments
    ///
    /// * `address` - The address to look up
    ///
    /// # Returns
    ///
    /// The sum of all credits minus all debits; 0 for an unknown address.
    /// Pending transactions are not counted.
    pub fn balance_of(&self, address: &Address) -> f64 {
        self.chain
            .iter()
            .flat_map(|block| block.transactions())
            .map(|transaction| transaction.balance_delta(address))
            .sum()
    }

    /// Checks every block after genesis for a stale hash or a broken link
    pub fn verify(&self) -> Result<(), IntegrityFault> {
        for (index, pair) in self.chain.windows(2).enumerate() {
            let (previous_block, current_block) = (&pair[0], &pair[1]);
            let index = index + 1;

            let computed = current_block.calculate_hash();
            if current_block.hash() != computed {
                return Err(IntegrityFault::HashMismatch {
                    index,
                    stored: current_block.hash().to_string(),
                    computed,
                });
            }

            if current_block.previous_hash() != previous_block.hash() {
                return Err(IntegrityFault::LinkBroken {
                    index,
                    expected: previous_block.hash().to_string(),
                    found: current_block.previous_hash().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Validates the blockchain
    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }
}
