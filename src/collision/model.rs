//! Multiplicative string-hash models
//!
//! A model evaluates `h(s) = sum(s[i] * m^w(i)) mod 2^bits` with fixed-width
//! wrapping arithmetic. `w(i)` is `n - 1 - i` for a left-to-right fold and
//! `i` for a right-to-left fold.

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Characters that are safe as form field names without escaping
pub const ALPHANUMERIC: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Order in which a runtime folds the characters of a string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// `h = h * m + c` over the string from the first character
    #[default]
    Forward,
    /// `h = h * m + c` over the string from the last character
    Backward,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

/// Immutable description of one runtime's string hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashModel {
    id: String,
    bit_width: u32,
    multiplier: u64,
    direction: Direction,
    /// Sorted by code point, no duplicates
    alphabet: Vec<char>,
}

impl HashModel {
    /// Create a model, validating width and alphabet
    pub fn new(
        id: impl Into<String>,
        bit_width: u32,
        multiplier: u64,
        direction: Direction,
        alphabet: &str,
    ) -> Result<Self, GenerationError> {
        let id = id.into();

        if id.trim().is_empty() {
            return Err(GenerationError::InvalidModel {
                id,
                reason: "identifier must not be empty".into(),
            });
        }

        if bit_width == 0 || bit_width > 64 {
            return Err(GenerationError::InvalidModel {
                id,
                reason: format!("bit width must be between 1 and 64 (got {})", bit_width),
            });
        }

        let mut chars: Vec<char> = alphabet.chars().collect();
        chars.sort_unstable();
        chars.dedup();

        if chars.len() < 2 {
            return Err(GenerationError::InvalidModel {
                id,
                reason: "alphabet needs at least two distinct characters".into(),
            });
        }

        Ok(Self {
            id,
            bit_width,
            multiplier,
            direction,
            alphabet: chars,
        })
    }

    /// Shift-add fold `h = (h << 10) + c`, 32-bit (V8/Ruby style)
    pub fn v8() -> Self {
        Self::builtin("v8", 32, 1024)
    }

    /// `String.hashCode`: `h = 31 * h + c`, 32-bit
    pub fn java() -> Self {
        Self::builtin("java", 32, 31)
    }

    /// DJBX33A: `h = 33 * h + c`, 64-bit `ulong`
    pub fn php() -> Self {
        Self::builtin("php", 64, 33)
    }

    fn builtin(id: &str, bit_width: u32, multiplier: u64) -> Self {
        let mut alphabet: Vec<char> = ALPHANUMERIC.chars().collect();
        alphabet.sort_unstable();

        Self {
            id: id.to_string(),
            bit_width,
            multiplier,
            direction: Direction::Forward,
            alphabet,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    /// Bit mask selecting the low `bit_width` bits
    pub fn mask(&self) -> u64 {
        if self.bit_width == 64 {
            u64::MAX
        } else {
            (1u64 << self.bit_width) - 1
        }
    }

    /// Evaluate the hash of a string
    pub fn evaluate(&self, input: &str) -> u64 {
        let chars: Vec<char> = input.chars().collect();
        self.evaluate_chars(&chars)
    }

    /// Evaluate the hash of a character sequence
    pub fn evaluate_chars(&self, chars: &[char]) -> u64 {
        let fold = |hash: u64, c: &char| {
            hash.wrapping_mul(self.multiplier)
                .wrapping_add(u64::from(*c as u32))
        };

        let hash = match self.direction {
            Direction::Forward => chars.iter().fold(0u64, fold),
            Direction::Backward => chars.iter().rev().fold(0u64, fold),
        };

        hash & self.mask()
    }

    /// Power of the multiplier applied to `position` in a string of `len` characters
    pub fn exponent(&self, position: usize, len: usize) -> u64 {
        match self.direction {
            Direction::Forward => (len - 1 - position) as u64,
            Direction::Backward => position as u64,
        }
    }

    /// `m^w(position) mod 2^bits`
    pub fn weight(&self, position: usize, len: usize) -> u64 {
        wrapping_pow(self.multiplier, self.exponent(position, len)) & self.mask()
    }

    /// Contribution of character `c` placed at `position`
    pub fn contribution(&self, c: char, position: usize, len: usize) -> u64 {
        u64::from(c as u32).wrapping_mul(self.weight(position, len)) & self.mask()
    }
}

/// `base^exp mod 2^64` by repeated squaring
pub(crate) fn wrapping_pow(base: u64, mut exp: u64) -> u64 {
    let mut result = 1u64;
    let mut base = base;

    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_matches_string_hash_code() {
        let java = HashModel::java();
        // "Aa".hashCode() == "BB".hashCode() == 2112
        assert_eq!(java.evaluate("Aa"), 2112);
        assert_eq!(java.evaluate("BB"), 2112);
        // "hashes".hashCode() == -1224424900
        assert_eq!(java.evaluate("hashes"), (-1224424900i32) as u32 as u64);
    }

    #[test]
    fn test_evaluate_wraps_at_bit_width() {
        let v8 = HashModel::v8();
        assert_eq!(v8.evaluate("hashes"), 3330380915);
        assert!(v8.evaluate("a much longer string than six characters") <= u64::from(u32::MAX));

        let php = HashModel::php();
        assert_eq!(php.evaluate("hashes"), 4189364668);
    }

    #[test]
    fn test_backward_direction_folds_from_the_end() {
        let model = HashModel::new("rtl", 32, 1024, Direction::Backward, ALPHANUMERIC).unwrap();
        assert_eq!(model.evaluate("hashes"), 120685672);

        let forward = HashModel::new("ltr", 32, 1024, Direction::Forward, ALPHANUMERIC).unwrap();
        assert_eq!(forward.evaluate("sehsah"), model.evaluate("hashes"));
    }

    #[test]
    fn test_evaluate_is_sum_of_contributions() {
        for model in [HashModel::v8(), HashModel::java(), HashModel::php()] {
            let chars: Vec<char> = "collide".chars().collect();
            let sum = chars
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, c)| acc.wrapping_add(model.contribution(*c, i, chars.len())))
                & model.mask();
            assert_eq!(sum, model.evaluate_chars(&chars), "model {}", model.id());
        }
    }

    #[test]
    fn test_weight_vanishes_for_high_powers_of_two() {
        let v8 = HashModel::v8();
        // 1024^4 = 2^40, which is 0 modulo 2^32
        assert_eq!(v8.weight(0, 5), 0);
        assert_eq!(v8.weight(1, 5), 1 << 30);
        assert_eq!(v8.weight(4, 5), 1);
    }

    #[test]
    fn test_model_validation() {
        assert!(HashModel::new("", 32, 31, Direction::Forward, ALPHANUMERIC).is_err());
        assert!(HashModel::new("x", 0, 31, Direction::Forward, ALPHANUMERIC).is_err());
        assert!(HashModel::new("x", 65, 31, Direction::Forward, ALPHANUMERIC).is_err());
        assert!(HashModel::new("x", 32, 31, Direction::Forward, "aaaa").is_err());

        let model = HashModel::new("x", 16, 31, Direction::Forward, "cbaabc").unwrap();
        assert_eq!(model.alphabet(), &['a', 'b', 'c']);
        assert_eq!(model.mask(), 0xffff);
    }

    #[test]
    fn test_wrapping_pow() {
        assert_eq!(wrapping_pow(31, 0), 1);
        assert_eq!(wrapping_pow(31, 2), 961);
        assert_eq!(wrapping_pow(2, 64), 0);
        assert_eq!(wrapping_pow(3, 41), 3u64.wrapping_pow(41));
    }
}
