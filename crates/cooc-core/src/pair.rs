use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::PAIR_SEPARATOR;
use crate::error::{CoreError, Result};

/// An unordered pair stored under whichever orientation was seen first.
///
/// Equality is orientation-sensitive on purpose: tables holding pair keys
/// probe both `key` and `key.reversed()` before inserting, so a pair only
/// ever lives under one of them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub first: String,
    pub second: String,
}

impl PairKey {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            first: self.second.clone(),
            second: self.first.clone(),
        }
    }

    /// Both orientations, stored one first.
    pub fn orientations(&self) -> [PairKey; 2] {
        [self.clone(), self.reversed()]
    }

    pub fn is_self_pair(&self) -> bool {
        self.first == self.second
    }

    /// `first,second` form used as a key/value store key.
    pub fn encode(&self) -> String {
        format!("{}{PAIR_SEPARATOR}{}", self.first, self.second)
    }

    pub fn decode(key: &str) -> Result<Self> {
        let (first, second) = key.split_once(PAIR_SEPARATOR).ok_or_else(|| {
            CoreError::Consistency(format!("pair key '{key}' has no '{PAIR_SEPARATOR}'"))
        })?;
        if second.contains(PAIR_SEPARATOR) {
            return Err(CoreError::Consistency(format!(
                "pair key '{key}' has more than two parts"
            )));
        }
        Ok(Self::new(first, second))
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let key = PairKey::new("diabetes", "risk");
        assert_eq!(key.encode(), "diabetes,risk");
        assert_eq!(PairKey::decode("diabetes,risk").unwrap(), key);
    }

    #[test]
    fn test_decode_multiword() {
        let key = PairKey::decode("major depression,sleep loss").unwrap();
        assert_eq!(key.first, "major depression");
        assert_eq!(key.second, "sleep loss");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            PairKey::decode("nocomma"),
            Err(CoreError::Consistency(_))
        ));
        assert!(PairKey::decode("a,b,c").is_err());
    }

    #[test]
    fn test_reversed() {
        let key = PairKey::new("a", "b");
        assert_eq!(key.reversed(), PairKey::new("b", "a"));
        assert_ne!(key, key.reversed());
        assert_eq!(key.orientations()[1], key.reversed());
    }

    #[test]
    fn test_self_pair() {
        assert!(PairKey::new("x", "x").is_self_pair());
        assert!(!PairKey::new("x", "y").is_self_pair());
    }
}
