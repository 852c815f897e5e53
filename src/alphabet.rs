//! Character alphabets for program generation.
//!
//! An alphabet fixes the character set candidates are drawn from and, through
//! character order, the digit values used by the address codec.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Default minimum ASCII value (inclusive): space.
pub const DEFAULT_ASCII_MIN: u8 = 32;

/// Default maximum ASCII value (inclusive): tilde.
pub const DEFAULT_ASCII_MAX: u8 = 126;

/// An ordered set of distinct characters.
///
/// The position of a character is its digit value in the base-N positional
/// encoding used by [`crate::address`]; the first character is digit zero.
#[derive(Debug, Clone)]
pub struct Alphabet {
    chars: Vec<char>,
    indices: HashMap<char, usize>,
}

impl Alphabet {
    /// Creates an alphabet from an inclusive ASCII range.
    pub fn ascii_range(min: u8, max: u8) -> Result<Self> {
        if min > max {
            return Err(Error::Config(format!(
                "ascii_min ({}) must not exceed ascii_max ({})",
                min, max
            )));
        }
        Ok(Self::from_distinct((min..=max).map(char::from).collect()))
    }

    /// Creates an alphabet from an explicit character string.
    ///
    /// Character order is preserved. Fails if the string is empty or
    /// contains a character more than once.
    pub fn from_chars(chars: &str) -> Result<Self> {
        if chars.is_empty() {
            return Err(Error::Config("alphabet must not be empty".to_string()));
        }

        let mut list = Vec::new();
        let mut indices = HashMap::new();
        for c in chars.chars() {
            if indices.insert(c, list.len()).is_some() {
                return Err(Error::Config(format!(
                    "alphabet contains duplicate character {:?}",
                    c
                )));
            }
            list.push(c);
        }

        Ok(Self {
            chars: list,
            indices,
        })
    }

    /// The default alphabet: the 95 printable ASCII characters.
    pub fn printable_ascii() -> Self {
        Self::from_distinct(
            (DEFAULT_ASCII_MIN..=DEFAULT_ASCII_MAX)
                .map(char::from)
                .collect(),
        )
    }

    /// Builds from characters already known to be distinct.
    fn from_distinct(chars: Vec<char>) -> Self {
        let indices = chars.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { chars, indices }
    }

    /// Number of characters (the base of the positional encoding).
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always false: constructors reject empty alphabets.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Returns the character for a digit value, if in range.
    pub fn char_at(&self, digit: usize) -> Option<char> {
        self.chars.get(digit).copied()
    }

    /// Returns the digit value of a character, if present.
    pub fn index_of(&self, c: char) -> Option<usize> {
        self.indices.get(&c).copied()
    }

    /// Iterates the characters in digit order.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.chars.iter().copied()
    }
}
