use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("interval is empty")]
    Empty,
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("interval must be positive")]
    NotPositive,
    #[error("interval {0:?} is too large")]
    Overflow(String),
}

const UNITS: [(&str, u128); 8] = [
    ("ns", 1),
    ("us", 1_000),
    ("\u{b5}s", 1_000),
    ("\u{3bc}s", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 3600 * 1_000_000_000),
];

/// Parse a polling interval such as `"30s"`, `"1m"`, `"1h30m"` or `"1.5h"`.
///
/// The string is a sequence of decimal numbers (optionally fractional), each
/// followed by a unit: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A leading
/// `+` is accepted. Zero and negative durations are rejected since a ticker
/// cannot fire at them.
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IntervalError::Empty);
    }
    let invalid = || IntervalError::Invalid(input.to_string());

    let mut rest = match trimmed.as_bytes()[0] {
        b'-' => {
            // Still validate the shape so "-garbage" reports as invalid
            parse_interval(&trimmed[1..]).map_err(|e| match e {
                IntervalError::NotPositive => IntervalError::NotPositive,
                _ => invalid(),
            })?;
            return Err(IntervalError::NotPositive);
        }
        b'+' => &trimmed[1..],
        _ => trimmed,
    };
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..digits_end];
        rest = &rest[digits_end..];

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(invalid());
        }

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];
        if unit.is_empty() {
            return Err(IntervalError::MissingUnit(input.to_string()));
        }

        let scale = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| IntervalError::UnknownUnit {
                unit: unit.to_string(),
                input: input.to_string(),
            })?;

        let overflow = || IntervalError::Overflow(input.to_string());
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;

        // Fraction digits beyond nanosecond precision are dropped
        let mut place = scale;
        for digit in frac.bytes() {
            place /= 10;
            if place == 0 {
                break;
            }
            nanos += u128::from(digit - b'0') * place;
        }

        total_nanos = total_nanos.checked_add(nanos).ok_or_else(overflow)?;
    }

    if total_nanos == 0 {
        return Err(IntervalError::NotPositive);
    }
    let nanos = u64::try_from(total_nanos).map_err(|_| IntervalError::Overflow(input.to_string()))?;
    Ok(Duration::from_nanos(nanos))
}
