use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_ASSET_LEN: usize = 15;

/// Trading pair normalized to canonical `BASE/QUOTE` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    /// Build a pair from its two assets, normalizing both to uppercase.
    pub fn new(base: &str, quote: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            base: normalize_asset(base)?,
            quote: normalize_asset(quote)?,
        })
    }

    /// Parse a `BASE/QUOTE` string such as `btc/usdt`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let Some((base, quote)) = trimmed.split_once('/') else {
            return Err(ValidationError::SymbolMissingQuote {
                value: trimmed.to_owned(),
            });
        };

        Self::new(base, quote)
    }

    /// Parse `input`, treating a bare base asset (`ETH`) as quoted in `default_quote`.
    pub fn parse_or_quote(input: &str, default_quote: &str) -> Result<Self, ValidationError> {
        if input.contains('/') {
            Self::parse(input)
        } else {
            Self::new(input, default_quote)
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Concatenated exchange notation, e.g. `BTCUSDT`.
    pub fn concatenated(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

fn normalize_asset(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }

    let normalized = trimmed.to_ascii_uppercase();
    let len = normalized.chars().count();
    if len > MAX_ASSET_LEN {
        return Err(ValidationError::AssetTooLong {
            asset: normalized,
            len,
            max: MAX_ASSET_LEN,
        });
    }

    for (index, ch) in normalized.chars().enumerate() {
        if !ch.is_ascii_alphanumeric() {
            return Err(ValidationError::AssetInvalidChar { ch, index });
        }
    }

    Ok(normalized)
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.to_string()
    }
}
