use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

/// Errors that can occur during transaction operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransactionError {
    #[error("Invalid amount: {0} (must be finite and non-negative)")]
    InvalidAmount(f64),
}

/// Identifies a party in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

/// A record of value movement.
///
/// A `Reward` has no sender: it mints `amount` to `recipient`. It is used for
/// mining rewards and for seeding balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Transaction {
    Reward {
        recipient: Address,
        amount: f64,
    },
    Transfer {
        sender: Address,
        recipient: Address,
        amount: f64,
    },
}

impl Transaction {
    /// Creates a reward (minting) transaction
    pub fn reward(recipient: impl Into<Address>, amount: f64) -> Self {
        Transaction::Reward {
            recipient: recipient.into(),
            amount,
        }
    }

    /// Creates a transfer between two parties
    pub fn transfer(sender: impl Into<Address>, recipient: impl Into<Address>, amount: f64) -> Self {
        Transaction::Transfer {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Returns the sender, or `None` for a reward
    pub fn sender(&self) -> Option<&Address> {
        match self {
            Transaction::Reward { .. } => None,
            Transaction::Transfer { sender, .. } => Some(sender),
        }
    }

    pub fn recipient(&self) -> &Address {
        match self {
            Transaction::Reward { recipient, .. } | Transaction::Transfer { recipient, .. } => recipient,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            Transaction::Reward { amount, .. } | Transaction::Transfer { amount, .. } => *amount,
        }
    }

    pub fn is_reward(&self) -> bool {
        matches!(self, Transaction::Reward { .. })
    }

    /// Checks that the amount is finite and non-negative
    pub fn validate(&self) -> Result<(), TransactionError> {
        let amount = self.amount();
        if !amount.is_finite() || amount < 0.0 {
            return Err(TransactionError::InvalidAmount(amount));
        }
        Ok(())
    }

    /// Signed effect of this transaction on the balance of `address`.
    ///
    /// A transfer to oneself nets out to zero.
    pub fn balance_delta(&self, address: &Address) -> f64 {
        let mut delta = 0.0;

        if self.sender() == Some(address) {
            delta -= self.amount();
        }
        if self.recipient() == address {
            delta += self.amount();
        }

        delta
    }

    /// Feeds a canonical encoding of the transaction into `hasher`.
    ///
    /// Fields are written in a fixed order and strings are length-prefixed, so
    /// two distinct transactions never produce the same byte stream.
    pub(crate) fn write_canonical(&self, hasher: &mut Sha256) {
        match self {
            Transaction::Reward { recipient, amount } => {
                hasher.update([0u8]);
                write_str(hasher, recipient.as_str());
                hasher.update(amount.to_le_bytes());
            }
            Transaction::Transfer {
                sender,
                recipient,
                amount,
            } => {
                hasher.update([1u8]);
                write_str(hasher, sender.as_str());
                write_str(hasher, recipient.as_str());
                hasher.update(amount.to_le_bytes());
            }
        }
    }
}

fn write_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}
