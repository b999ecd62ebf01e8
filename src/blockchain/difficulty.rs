use serde::{Deserialize, Serialize};

use std::fmt;

/// Largest meaningful difficulty: every bit of a SHA-256 digest is zero
pub const MAX_DIFFICULTY_BITS: u32 = 256;

/// A predicate over a hex-encoded block hash deciding whether mining may stop
pub trait HashTarget {
    fn is_met_by(&self, hash: &str) -> bool;
}

impl<F> HashTarget for F
where
    F: Fn(&str) -> bool,
{
    fn is_met_by(&self, hash: &str) -> bool {
        self(hash)
    }
}

/// Mining difficulty as the number of leading zero bits the hash must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Difficulty(u32);

impl Difficulty {
    /// Creates a difficulty, clamped to [`MAX_DIFFICULTY_BITS`]
    pub fn new(bits: u32) -> Self {
        Difficulty(bits.min(MAX_DIFFICULTY_BITS))
    }

    /// Difficulty equivalent to `zeros` leading `'0'` hex characters
    pub fn from_hex_zeros(zeros: u32) -> Self {
        Difficulty::new(zeros.saturating_mul(4))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl Default for Difficulty {
    /// Two leading hex zeros
    fn default() -> Self {
        Difficulty::from_hex_zeros(2)
    }
}

impl TryFrom<u32> for Difficulty {
    type Error = String;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        if bits > MAX_DIFFICULTY_BITS {
            return Err(format!(
                "difficulty of {} bits exceeds the {}-bit hash",
                bits, MAX_DIFFICULTY_BITS
            ));
        }
        Ok(Difficulty(bits))
    }
}

impl From<Difficulty> for u32 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bits", self.0)
    }
}

impl HashTarget for Difficulty {
    fn is_met_by(&self, hash: &str) -> bool {
        if self.0 == 0 {
            return true;
        }

        match hex::decode(hash) {
            Ok(bytes) => leading_zero_bits(&bytes) >= self.0,
            Err(_) => false,
        }
    }
}

/// Counts the leading zero bits of a byte string
pub fn leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut count = 0;
    for &b in bytes {
        if b == 0 {
            count += 8;
        } else {
            count += b.leading_zeros();
            break;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_zero_bits() {
        assert_eq!(leading_zero_bits(&[]), 0);
        assert_eq!(leading_zero_bits(&[0xff]), 0);
        assert_eq!(leading_zero_bits(&[0x00, 0x80]), 8);
        assert_eq!(leading_zero_bits(&[0x00, 0x0f, 0x00]), 12);
        assert_eq!(leading_zero_bits(&[0x00; 32]), 256);
    }

    #[test]
    fn test_difficulty_predicate() {
        let difficulty = Difficulty::new(8);

        assert!(difficulty.is_met_by("00ff"));
        assert!(difficulty.is_met_by("0001"));
        assert!(!difficulty.is_met_by("0fff"));
        assert!(!difficulty.is_met_by("not hex"));
    }

    #[test]
    fn test_partial_nibble() {
        let difficulty = Difficulty::new(5);

        assert!(difficulty.is_met_by("07ff"));
        assert!(!difficulty.is_met_by("08ff"));
    }

    #[test]
    fn test_zero_difficulty_accepts_anything() {
        let difficulty = Difficulty::new(0);
        assert!(difficulty.is_met_by("ffff"));
        assert!(difficulty.is_met_by(""));
    }

    #[test]
    fn test_hex_zeros_and_clamp() {
        assert_eq!(Difficulty::from_hex_zeros(2).bits(), 8);
        assert_eq!(Difficulty::default().bits(), 8);
        assert_eq!(Difficulty::new(1000).bits(), MAX_DIFFICULTY_BITS);
    }

    #[test]
    fn test_deserialize_rejects_unreachable_difficulty() {
        let ok: Difficulty = serde_json::from_str("12").unwrap();
        assert_eq!(ok.bits(), 12);

        assert!(serde_json::from_str::<Difficulty>("257").is_err());
    }

    #[test]
    fn test_closure_target() {
        let prefix = |hash: &str| hash.starts_with("00");
        assert!(prefix.is_met_by("00ab"));
        assert!(!prefix.is_met_by("0a00"));
    }
}
