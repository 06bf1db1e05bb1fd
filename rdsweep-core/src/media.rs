//! Media property value types shared by the probe, the sweep and the table.

use crate::error::{CoreError, CoreResult};

use std::fmt;
use std::str::FromStr;

/// Frame dimensions, written as `WxH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = CoreError;

    /// Parses `WxH`: exactly one `x` between two positive integers.
    fn from_str(s: &str) -> CoreResult<Self> {
        let invalid = || CoreError::Configuration(format!("invalid resolution '{s}' (expected WxH)"));
        let mut parts = s.split('x');
        let (Some(w), Some(h), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        if !is_digits(w) || !is_digits(h) {
            return Err(invalid());
        }
        let width = w.parse::<u32>().map_err(|_| invalid())?;
        let height = h.parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Rational frame rate as reported by ffprobe (`num/den`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for FrameRate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (n, d),
            None => (s, "1"),
        };
        let num = num
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid frame rate numerator in '{s}'"))?;
        let den = den
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid frame rate denominator in '{s}'"))?;
        if den == 0 {
            return Err(format!("zero frame rate denominator in '{s}'"));
        }
        Ok(Self { num, den })
    }
}
