//! Exact token amounts
//!
//! Amounts are carried as integer base units together with the mint's decimal
//! precision. Scaling from user-facing units uses checked integer arithmetic
//! only, so large amounts never lose precision.

use super::errors::{PipelineError, PipelineResult};
use std::fmt;

/// Largest precision whose scale factor fits in a `u64`
pub const MAX_DECIMALS: u8 = 19;

/// Token quantity in base units at a declared precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenAmount {
    base_units: u64,
    decimals: u8,
}

impl TokenAmount {
    /// Amount already expressed in base units
    pub fn from_base_units(base_units: u64, decimals: u8) -> PipelineResult<Self> {
        scale_factor(decimals)?;
        Ok(Self {
            base_units,
            decimals,
        })
    }

    /// `whole * 10^decimals`
    pub fn from_whole(whole: u64, decimals: u8) -> PipelineResult<Self> {
        let base_units = whole.checked_mul(scale_factor(decimals)?).ok_or_else(|| {
            PipelineError::invalid_amount(format!(
                "{} tokens at {} decimals overflows u64 base units",
                whole, decimals
            ))
        })?;
        Ok(Self {
            base_units,
            decimals,
        })
    }

    /// Parse a decimal string such as `"1.25"` into base units
    ///
    /// Rejects signs, exponents, empty parts and more fractional digits than
    /// the precision allows.
    pub fn parse(input: &str, decimals: u8) -> PipelineResult<Self> {
        let scale = scale_factor(decimals)?;
        let trimmed = input.trim();

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(PipelineError::invalid_amount(format!(
                "'{}' is not a number",
                input
            )));
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(PipelineError::invalid_amount(format!(
                "'{}' is not a non-negative decimal number",
                input
            )));
        }
        if fraction.len() > decimals as usize {
            return Err(PipelineError::invalid_amount(format!(
                "'{}' has more than {} fractional digits",
                input, decimals
            )));
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u64>().map_err(|_| {
                PipelineError::invalid_amount(format!("'{}' is too large", input))
            })?
        };

        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let padding = 10u64.pow((decimals as usize - fraction.len()) as u32);
            // fraction has at most `decimals` digits, so this stays below `scale`
            fraction.parse::<u64>().map_err(|_| {
                PipelineError::invalid_amount(format!("'{}' is too large", input))
            })? * padding
        };

        let base_units = whole_units
            .checked_mul(scale)
            .and_then(|w| w.checked_add(fraction_units))
            .ok_or_else(|| {
                PipelineError::invalid_amount(format!(
                    "'{}' overflows u64 base units at {} decimals",
                    input, decimals
                ))
            })?;

        Ok(Self {
            base_units,
            decimals,
        })
    }

    pub fn base_units(&self) -> u64 {
        self.base_units
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.base_units);
        }
        let scale = 10u64.pow(self.decimals as u32);
        let whole = self.base_units / scale;
        let fraction = self.base_units % scale;
        let fraction = format!("{:0width$}", fraction, width = self.decimals as usize);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            write!(f, "{}", whole)
        } else {
            write!(f, "{}.{}", whole, fraction)
        }
    }
}

fn scale_factor(decimals: u8) -> PipelineResult<u64> {
    if decimals > MAX_DECIMALS {
        return Err(PipelineError::invalid_amount(format!(
            "precision of {} decimals exceeds the supported maximum of {}",
            decimals, MAX_DECIMALS
        )));
    }
    Ok(10u64.pow(decimals as u32))
}
