//! Multi-denomination balances.
//!
//! A [`Coins`] value is kept normalized: sorted by denomination, each
//! denomination at most once, no zero amounts. Arithmetic is checked and
//! never produces a negative or overflowing amount.

use std::cmp::Ordering;
use std::fmt;

use hubchain_primitives::codec::{decode_seq, encode_seq, CodecError, Decode, Encode, Reader};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coins(Vec<Coin>);

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize an arbitrary list: sort, merge repeated denominations, and
    /// drop zero amounts. Returns `None` if merging overflows.
    pub fn normalize(mut coins: Vec<Coin>) -> Option<Self> {
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        let mut out: Vec<Coin> = Vec::with_capacity(coins.len());
        for coin in coins {
            match out.last_mut() {
                Some(last) if last.denom == coin.denom => {
                    last.amount = last.amount.checked_add(coin.amount)?;
                }
                _ => out.push(coin),
            }
        }
        out.retain(|c| c.amount > 0);
        Some(Self(out))
    }

    /// Single-denomination value. A zero amount yields the empty set.
    pub fn single(coin: Coin) -> Self {
        if coin.amount == 0 {
            Self::new()
        } else {
            Self(vec![coin])
        }
    }

    /// Sorted, unique, and non-zero.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|c| c.amount > 0 && !c.denom.is_empty())
            && self.0.windows(2).all(|w| w[0].denom < w[1].denom)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn amount_of(&self, denom: &str) -> u64 {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map_or(0, |c| c.amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Coin] {
        &self.0
    }

    /// Merge-add two normalized sets. `None` on overflow.
    pub fn checked_add(&self, other: &Coins) -> Option<Coins> {
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].denom.cmp(&b[j].denom) {
                Ordering::Less => {
                    out.push(a[i].clone());
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(b[j].clone());
                    j += 1;
                }
                Ordering::Equal => {
                    let amount = a[i].amount.checked_add(b[j].amount)?;
                    out.push(Coin::new(a[i].denom.clone(), amount));
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        Some(Coins(out))
    }

    /// Subtract `other`. `None` if any denomination would go negative.
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut out = self.0.clone();
        for coin in &other.0 {
            let pos = out.iter().position(|c| c.denom == coin.denom);
            match pos {
                Some(i) => out[i].amount = out[i].amount.checked_sub(coin.amount)?,
                None if coin.amount == 0 => {}
                None => return None,
            }
        }
        out.retain(|c| c.amount > 0);
        Some(Coins(out))
    }

    /// `true` when every denomination in `other` is covered by `self`.
    pub fn covers(&self, other: &Coins) -> bool {
        self.checked_sub(other).is_some()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("0");
        }
        for (i, coin) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{coin}")?;
        }
        Ok(())
    }
}

impl Encode for Coin {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.denom.encode_to(buf);
        self.amount.encode_to(buf);
    }
}

impl Decode for Coin {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            denom: String::decode_from(r)?,
            amount: r.read_u64()?,
        })
    }
}

impl Encode for Coins {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        encode_seq(&self.0, buf);
    }
}

/// Decoding does not normalize; callers check [`Coins::is_valid`].
impl Decode for Coins {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self(decode_seq(r)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(list: &[(&str, u64)]) -> Coins {
        Coins::normalize(list.iter().map(|(d, a)| Coin::new(*d, *a)).collect()).unwrap()
    }

    #[test]
    fn test_normalize_sorts_merges_and_drops_zero() {
        let c = coins(&[("eth", 3), ("atom", 1), ("eth", 2), ("btc", 0)]);
        assert_eq!(c.as_slice(), &[Coin::new("atom", 1), Coin::new("eth", 5)]);
        assert!(c.is_valid());
    }

    #[test]
    fn test_normalize_overflow() {
        assert!(Coins::normalize(vec![Coin::new("a", u64::MAX), Coin::new("a", 1)]).is_none());
    }

    #[test]
    fn test_is_valid_rejects_unsorted_and_duplicates() {
        assert!(!Coins(vec![Coin::new("b", 1), Coin::new("a", 1)]).is_valid());
        assert!(!Coins(vec![Coin::new("a", 1), Coin::new("a", 1)]).is_valid());
        assert!(!Coins(vec![Coin::new("a", 0)]).is_valid());
        assert!(Coins::new().is_valid());
    }

    #[test]
    fn test_checked_add_merges() {
        let sum = coins(&[("a", 1), ("c", 3)])
            .checked_add(&coins(&[("b", 2), ("c", 4)]))
            .unwrap();
        assert_eq!(sum, coins(&[("a", 1), ("b", 2), ("c", 7)]));
    }

    #[test]
    fn test_checked_sub() {
        let have = coins(&[("a", 5), ("b", 2)]);
        assert_eq!(have.checked_sub(&coins(&[("a", 5)])).unwrap(), coins(&[("b", 2)]));
        assert!(have.checked_sub(&coins(&[("a", 6)])).is_none());
        assert!(have.checked_sub(&coins(&[("z", 1)])).is_none());
        assert!(have.covers(&Coins::new()));
    }

    #[test]
    fn test_single_zero_is_empty() {
        assert!(Coins::single(Coin::new("a", 0)).is_zero());
        assert_eq!(Coins::single(Coin::new("a", 4)).amount_of("a"), 4);
    }

    #[test]
    fn test_display() {
        assert_eq!(coins(&[("atom", 10), ("eth", 2)]).to_string(), "10atom,2eth");
        assert_eq!(Coins::new().to_string(), "0");
    }
}
