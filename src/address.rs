//! Babel address codec.
//!
//! A program of length L over an alphabet of size B is a number in
//! little-endian base-B positional notation: the first character is the
//! least-significant digit. The address is that number rendered as lowercase
//! hex. Default-sized programs (7900 characters over 95 symbols) are numbers
//! of roughly 52 kbit, so the arithmetic runs over little-endian u64 limbs
//! rather than machine integers.

use crate::alphabet::Alphabet;
use crate::error::{Error, Result};

/// Converts an address back into the program text stored at it.
///
/// The hex string may carry a `0x` prefix and may have odd length. Digits
/// beyond position `len` are discarded; a short address pads the tail with
/// the alphabet's first character.
pub fn decode(address: &str, len: usize, alphabet: &Alphabet) -> Result<String> {
    let mut limbs = parse_hex(address)?;
    let base = alphabet.len() as u64;

    let mut text = String::with_capacity(len);
    for _ in 0..len {
        let digit = div_rem_small(&mut limbs, base) as usize;
        let c = alphabet
            .char_at(digit)
            .expect("digit is reduced modulo the alphabet size");
        text.push(c);
    }

    Ok(text)
}

/// Converts program text into its address.
///
/// The output is minimal lowercase hex without a `0x` prefix; the text
/// consisting entirely of the alphabet's first character encodes as `"0"`.
/// Fails on any character outside the alphabet, naming the character and
/// its position.
pub fn encode(text: &str, alphabet: &Alphabet) -> Result<String> {
    let mut digits = Vec::new();
    for (position, c) in text.chars().enumerate() {
        let digit = alphabet.index_of(c).ok_or_else(|| {
            Error::Address(format!(
                "character {:?} at position {} is not in the alphabet",
                c, position
            ))
        })?;
        digits.push(digit);
    }

    Ok(encode_digits(&digits, alphabet.len()))
}

/// Encodes a digit sequence (least-significant first) directly.
///
/// Used by the sampler, where digits are drawn before they are mapped to
/// characters and cannot be out of range.
pub(crate) fn encode_digits(digits: &[usize], base: usize) -> String {
    let mut limbs: Vec<u64> = Vec::new();
    for &digit in digits.iter().rev() {
        mul_add_small(&mut limbs, base as u64, digit as u64);
    }
    limbs_to_hex(&limbs)
}

/// Splits flat program text into newline-joined display lines.
///
/// Presentation only; execution always receives the flat text. A zero line
/// length returns the text unchanged.
pub fn format_lines(text: &str, line_length: usize) -> String {
    if line_length == 0 {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(line_length)
        .map(|line| line.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses a hex address into little-endian u64 limbs.
fn parse_hex(address: &str) -> Result<Vec<u64>> {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);

    if digits.is_empty() {
        return Err(Error::Address("empty address".to_string()));
    }

    // hex::decode requires an even number of nibbles
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{}", digits);
        &padded
    } else {
        digits
    };

    let bytes = hex::decode(digits)
        .map_err(|e| Error::Address(format!("malformed hex address: {}", e)))?;

    let mut limbs = Vec::with_capacity(bytes.len().div_ceil(8));
    for chunk in bytes.rchunks(8) {
        let mut limb = 0u64;
        for &b in chunk {
            limb = (limb << 8) | b as u64;
        }
        limbs.push(limb);
    }
    trim_limbs(&mut limbs);

    Ok(limbs)
}

/// Divides the limb number in place by `base`, returning the remainder.
fn div_rem_small(limbs: &mut Vec<u64>, base: u64) -> u64 {
    let mut rem = 0u128;
    for limb in limbs.iter_mut().rev() {
        let acc = (rem << 64) | *limb as u128;
        *limb = (acc / base as u128) as u64;
        rem = acc % base as u128;
    }
    trim_limbs(limbs);
    rem as u64
}

/// Computes `limbs = limbs * mul + add` in place.
fn mul_add_small(limbs: &mut Vec<u64>, mul: u64, add: u64) {
    let mut carry = add as u128;
    for limb in limbs.iter_mut() {
        let acc = *limb as u128 * mul as u128 + carry;
        *limb = acc as u64;
        carry = acc >> 64;
    }
    while carry != 0 {
        limbs.push(carry as u64);
        carry >>= 64;
    }
}

fn trim_limbs(limbs: &mut Vec<u64>) {
    while limbs.last() == Some(&0) {
        limbs.pop();
    }
}

/// Renders limbs as minimal lowercase hex; zero renders as `"0"`.
fn limbs_to_hex(limbs: &[u64]) -> String {
    let mut bytes = Vec::with_capacity(limbs.len() * 8);
    for limb in limbs.iter().rev() {
        bytes.extend_from_slice(&limb.to_be_bytes());
    }

    match bytes.iter().position(|&b| b != 0) {
        None => "0".to_string(),
        Some(first) => {
            let hex = hex::encode(&bytes[first..]);
            // the first byte may still carry a zero high nibble
            hex.trim_start_matches('0').to_string()
        }
    }
}
