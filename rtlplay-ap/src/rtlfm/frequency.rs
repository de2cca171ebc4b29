//! Tuning frequency in Hz
//!
//! Parses the rtl_fm notation: a bare integer is Hz, a `K` or `M` suffix
//! scales a decimal number to kilo- or megahertz.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

const KILO: u64 = 1_000;
const MEGA: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frequency(u64);

impl Frequency {
    pub const fn from_hz(hz: u64) -> Self {
        Self(hz)
    }

    pub const fn hz(self) -> u64 {
        self.0
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidFrequency(s.to_string());
        let trimmed = s.trim();

        let (number, scale) = match trimmed.char_indices().last() {
            Some((idx, 'K' | 'k')) => (&trimmed[..idx], KILO),
            Some((idx, 'M' | 'm')) => (&trimmed[..idx], MEGA),
            Some(_) => (trimmed, 1),
            None => return Err(invalid()),
        };

        if scale == 1 {
            return number.parse::<u64>().map(Self).map_err(|_| invalid());
        }

        let value: f64 = number.parse().map_err(|_| invalid())?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid());
        }
        let hz = (value * scale as f64).round();
        if hz > u64::MAX as f64 {
            return Err(invalid());
        }
        Ok(Self(hz as u64))
    }
}

/// Whole part, then the fraction with trailing zeros trimmed (at least one digit)
fn write_scaled(f: &mut fmt::Formatter<'_>, hz: u64, scale: u64, suffix: char) -> fmt::Result {
    let width = scale.ilog10() as usize;
    let fraction = format!("{:0width$}", hz % scale, width = width);
    let fraction = fraction.trim_end_matches('0');
    let fraction = if fraction.is_empty() { "0" } else { fraction };
    write!(f, "{}.{}{}", hz / scale, fraction, suffix)
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            hz if hz < KILO => write!(f, "{}", hz),
            hz if hz < MEGA => write_scaled(f, hz, KILO, 'K'),
            hz => write_scaled(f, hz, MEGA, 'M'),
        }
    }
}
