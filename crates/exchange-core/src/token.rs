// exchange-core/src/token.rs

use exchange_crypto::Address;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of a tradable asset.
///
/// Pairs are always stored with their tokens in canonical order:
/// `Native` sorts before `Single`, `Single` before `Multi`, and
/// contract-backed tokens compare by contract address then class id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenId {
    /// The chain's native coin
    Native,
    /// A single-asset token contract
    Single(Address),
    /// A class within a multi-asset token contract
    Multi(Address, u64),
}

impl TokenId {
    fn rank(&self) -> u8 {
        match self {
            TokenId::Native => 0,
            TokenId::Single(_) => 1,
            TokenId::Multi(_, _) => 2,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, TokenId::Native)
    }
}

impl Ord for TokenId {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => match (self, other) {
                (TokenId::Native, TokenId::Native) => Ordering::Equal,
                (TokenId::Single(a), TokenId::Single(b)) => a.as_bytes().cmp(b.as_bytes()),
                (TokenId::Multi(a, i), TokenId::Multi(b, j)) => {
                    a.as_bytes().cmp(b.as_bytes()).then(i.cmp(j))
                }
                _ => unreachable!("rank already ordered the variants"),
            },
            ord => ord,
        }
    }
}

impl PartialOrd for TokenId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenId::Native => write!(f, "native"),
            TokenId::Single(addr) => write!(f, "single:{}", addr),
            TokenId::Multi(addr, id) => write!(f, "multi:{}:{}", addr, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[test]
    fn test_variant_ordering() {
        let native = TokenId::Native;
        let single = TokenId::Single(addr(1));
        let multi = TokenId::Multi(addr(1), 0);

        assert!(native < single);
        assert!(single < multi);
    }

    #[test]
    fn test_address_then_class_ordering() {
        let a = TokenId::Multi(addr(1), 5);
        let b = TokenId::Multi(addr(1), 9);
        let c = TokenId::Multi(addr(2), 0);

        assert!(a < b);
        assert!(b < c);

        let s1 = TokenId::Single(addr(3));
        let s2 = TokenId::Single(addr(4));
        assert!(s1 < s2);
    }

    #[test]
    fn test_equality() {
        assert_eq!(TokenId::Multi(addr(7), 1), TokenId::Multi(addr(7), 1));
        assert_ne!(TokenId::Multi(addr(7), 1), TokenId::Multi(addr(7), 2));
    }
}
