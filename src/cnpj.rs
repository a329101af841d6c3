//! CNPJ (fund tax identifier) canonicalization.
//!
//! The regulator publishes identifiers punctuated in some files and as bare
//! digits in others, sometimes without leading zeros. Every join between
//! registry and report tables goes through [`canonicalize`] on both sides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FundsError;

const CNPJ_DIGITS: usize = 14;

/// Canonical `NN.NNN.NNN/NNNN-NN` form of an identifier.
///
/// Punctuation and any other non-digit characters are stripped, the digits
/// are left-padded with zeros to 14 and the separators re-inserted. Inputs
/// longer than 14 digits keep their extra digits in the last group, so the
/// function stays idempotent for every input.
pub fn canonicalize(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let padded = if digits.len() < CNPJ_DIGITS {
        format!("{:0>width$}", digits, width = CNPJ_DIGITS)
    } else {
        digits
    };

    format!(
        "{}.{}.{}/{}-{}",
        &padded[..2],
        &padded[2..5],
        &padded[5..8],
        &padded[8..12],
        &padded[12..]
    )
}

/// Validated fund identifier, always stored in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cnpj(String);

impl Cnpj {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 14 digits without punctuation
    pub fn digits(&self) -> String {
        self.0.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

impl FromStr for Cnpj {
    type Err = FundsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let has_invalid = trimmed
            .chars()
            .any(|c| !(c.is_ascii_digit() || matches!(c, '.' | '/' | '-')));
        let count = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
        if has_invalid || count == 0 || count > CNPJ_DIGITS {
            return Err(FundsError::Parse(format!("invalid CNPJ '{}'", s)));
        }
        Ok(Cnpj(canonicalize(trimmed)))
    }
}

impl TryFrom<String> for Cnpj {
    type Error = FundsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cnpj> for String {
    fn from(value: Cnpj) -> Self {
        value.0
    }
}

impl fmt::Display for Cnpj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when `value` already has the `NN.NNN.NNN/NNNN-NN` shape.
pub fn is_canonical(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 18 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| match i {
        2 | 6 => *b == b'.',
        10 => *b == b'/',
        15 => *b == b'-',
        _ => b.is_ascii_digit(),
    })
}
