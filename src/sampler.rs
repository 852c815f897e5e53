//! Candidate program sampling.
//!
//! A sampler draws characters uniformly from an alphabet using an owned,
//! seeded random generator, so a run is reproducible from its configuration
//! alone. Each candidate carries its generation index and babel address.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::address;
use crate::alphabet::{Alphabet, DEFAULT_ASCII_MAX, DEFAULT_ASCII_MIN};
use crate::error::{Error, Result};

/// Configuration for candidate generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Characters per line in the generated program.
    #[serde(default = "default_line_length")]
    pub line_length: usize,

    /// Total number of lines in the generated program.
    #[serde(default = "default_total_lines")]
    pub total_lines: usize,

    /// Minimum ASCII value (inclusive) for characters.
    #[serde(default = "default_ascii_min")]
    pub ascii_min: u8,

    /// Maximum ASCII value (inclusive) for characters.
    #[serde(default = "default_ascii_max")]
    pub ascii_max: u8,

    /// Explicit alphabet, overriding the ASCII range.
    #[serde(default)]
    pub alphabet: Option<String>,

    /// Seed for deterministic generation. Unset draws from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_line_length() -> usize {
    79
}

fn default_total_lines() -> usize {
    100
}

fn default_ascii_min() -> u8 {
    DEFAULT_ASCII_MIN
}

fn default_ascii_max() -> u8 {
    DEFAULT_ASCII_MAX
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            line_length: default_line_length(),
            total_lines: default_total_lines(),
            ascii_min: default_ascii_min(),
            ascii_max: default_ascii_max(),
            alphabet: None,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Creates a configuration with the default program shape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the seed for deterministic generation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets an explicit alphabet, overriding the ASCII range.
    pub fn with_alphabet(mut self, alphabet: impl Into<String>) -> Self {
        self.alphabet = Some(alphabet.into());
        self
    }

    /// Sets the characters per line.
    pub fn with_line_length(mut self, line_length: usize) -> Self {
        self.line_length = line_length;
        self
    }

    /// Sets the total number of lines.
    pub fn with_total_lines(mut self, total_lines: usize) -> Self {
        self.total_lines = total_lines;
        self
    }

    /// Total number of characters in a generated program, or `None` when
    /// the product overflows.
    pub fn program_length(&self) -> Option<usize> {
        self.line_length.checked_mul(self.total_lines)
    }

    /// Builds the alphabet described by this configuration.
    pub fn build_alphabet(&self) -> Result<Alphabet> {
        match &self.alphabet {
            Some(chars) => Alphabet::from_chars(chars),
            None => Alphabet::ascii_range(self.ascii_min, self.ascii_max),
        }
    }
}

/// One generated program text under test.
///
/// The text is fixed at generation; the address re-materializes it via
/// [`crate::address::decode`] with the generating alphabet and length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    text: String,
    index: usize,
    address: String,
}

impl Candidate {
    /// The raw program text, without line breaks.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Generation index within the run, starting at zero.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Babel address of the text (lowercase hex).
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Number of characters in the text.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Lazy sequence of candidates over an owned random generator.
///
/// Candidates are not deduplicated: N draws yield N candidates, duplicates
/// possible. Each character is drawn uniformly and independently.
#[derive(Debug)]
pub struct Sampler {
    alphabet: Alphabet,
    program_length: usize,
    remaining: usize,
    next_index: usize,
    rng: StdRng,
}

impl Sampler {
    /// Creates a sampler that will produce `samples` candidates.
    pub fn new(config: &GeneratorConfig, samples: usize) -> Result<Self> {
        let alphabet = config.build_alphabet()?;

        let program_length = config.program_length().ok_or_else(|| {
            Error::Config(format!(
                "program length overflows: {} lines of {} characters each",
                config.total_lines, config.line_length
            ))
        })?;
        if program_length == 0 {
            return Err(Error::Config(
                "program length must be positive: line_length and total_lines must both be nonzero"
                    .to_string(),
            ));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            alphabet,
            program_length,
            remaining: samples,
            next_index: 0,
            rng,
        })
    }

    /// The alphabet candidates are drawn from.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Number of characters in each candidate.
    pub fn program_length(&self) -> usize {
        self.program_length
    }
}

impl Iterator for Sampler {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let mut digits = Vec::with_capacity(self.program_length);
        let mut text = String::with_capacity(self.program_length);
        for _ in 0..self.program_length {
            let digit = self.rng.gen_range(0..self.alphabet.len());
            let c = self
                .alphabet
                .char_at(digit)
                .expect("digit drawn within alphabet bounds");
            digits.push(digit);
            text.push(c);
        }

        let address = address::encode_digits(&digits, self.alphabet.len());
        let index = self.next_index;
        self.next_index += 1;

        Some(Candidate {
            text,
            index,
            address,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
