//! Signed duration strings as accepted by the `publishTimeout` query parameter.
//!
//! A duration string is a possibly signed sequence of decimal numbers, each with an optional
//! fraction and a unit suffix, such as "300ms", "-1.5h" or "2h45m". Valid units are "ns",
//! "us" (or "µs"/"μs"), "ms", "s", "m" and "h". The value must fit in an `i64` of nanoseconds.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

const NANOSECOND: u64 = 1;
const MICROSECOND: u64 = 1_000 * NANOSECOND;
const MILLISECOND: u64 = 1_000 * MICROSECOND;
const SECOND: u64 = 1_000 * MILLISECOND;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

/// Magnitude of `i64::MIN`, the largest magnitude a negative value may have.
const MAX_MAGNITUDE: u64 = 1 << 63;

/// A span of time that may be negative, with nanosecond precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignedDuration {
    nanos: i64,
}

impl SignedDuration {
    pub const ZERO: SignedDuration = SignedDuration { nanos: 0 };

    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub const fn as_nanos(&self) -> i64 {
        self.nanos
    }

    pub const fn is_negative(&self) -> bool {
        self.nanos < 0
    }

    /// The deadline to apply to an operation. Zero and negative values are an already expired
    /// deadline.
    pub fn to_timeout(self) -> Duration {
        u64::try_from(self.nanos).map_or(Duration::ZERO, Duration::from_nanos)
    }
}

impl From<Duration> for SignedDuration {
    fn from(value: Duration) -> Self {
        Self {
            nanos: i64::try_from(value.as_nanos()).unwrap_or(i64::MAX),
        }
    }
}

impl fmt::Display for SignedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = Duration::from_nanos(self.nanos.unsigned_abs());
        if self.is_negative() {
            write!(f, "-{magnitude:?}")
        } else {
            write!(f, "{magnitude:?}")
        }
    }
}

impl FromStr for SignedDuration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

fn invalid(orig: &str) -> Error {
    Error::Configuration(format!("invalid duration {orig:?}"))
}

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(NANOSECOND),
        "us" | "µs" | "μs" => Some(MICROSECOND),
        "ms" => Some(MILLISECOND),
        "s" => Some(SECOND),
        "m" => Some(MINUTE),
        "h" => Some(HOUR),
        _ => None,
    }
}

/// Consume the leading digits of `s`. `None` on overflow.
fn leading_int(s: &str) -> Option<(u64, &str)> {
    let end = s.bytes().take_while(u8::is_ascii_digit).count();
    let (digits, rest) = s.split_at(end);
    let mut x: u64 = 0;
    for b in digits.bytes() {
        if x > MAX_MAGNITUDE / 10 {
            return None;
        }
        x = x * 10 + u64::from(b - b'0');
        if x > MAX_MAGNITUDE {
            return None;
        }
    }
    Some((x, rest))
}

/// Consume the leading digits of a fraction. Digits beyond what fits are dropped, they only
/// add precision that a nanosecond count cannot hold anyway.
fn leading_fraction(s: &str) -> (u64, f64, &str) {
    let end = s.bytes().take_while(u8::is_ascii_digit).count();
    let (digits, rest) = s.split_at(end);
    let mut x: u64 = 0;
    let mut scale = 1.0_f64;
    let mut overflow = false;
    for b in digits.bytes() {
        if overflow {
            continue;
        }
        match x
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
        {
            Some(v) if v <= MAX_MAGNITUDE => {
                x = v;
                scale *= 10.0;
            }
            _ => overflow = true,
        }
    }
    (x, scale, rest)
}

fn parse(orig: &str) -> Result<SignedDuration> {
    let mut s = orig;
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    if s == "0" {
        return Ok(SignedDuration::ZERO);
    }
    if s.is_empty() {
        return Err(invalid(orig));
    }

    let mut total: u64 = 0;
    while !s.is_empty() {
        if !s.starts_with(|c: char| c == '.' || c.is_ascii_digit()) {
            return Err(invalid(orig));
        }

        let before = s.len();
        let (mut value, rest) = leading_int(s).ok_or_else(|| invalid(orig))?;
        s = rest;
        let has_int = before != s.len();

        let mut fraction = 0;
        let mut scale = 1.0;
        let mut has_fraction = false;
        if let Some(rest) = s.strip_prefix('.') {
            let before = rest.len();
            (fraction, scale, s) = leading_fraction(rest);
            has_fraction = before != s.len();
        }
        if !has_int && !has_fraction {
            // "." or "-.h"
            return Err(invalid(orig));
        }

        let unit_end = s
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(s.len());
        if unit_end == 0 {
            return Err(Error::Configuration(format!(
                "missing unit in duration {orig:?}"
            )));
        }
        let (unit, rest) = s.split_at(unit_end);
        s = rest;
        let unit = unit_nanos(unit).ok_or_else(|| {
            Error::Configuration(format!("unknown unit {unit:?} in duration {orig:?}"))
        })?;

        if value > MAX_MAGNITUDE / unit {
            return Err(invalid(orig));
        }
        value *= unit;
        if fraction > 0 {
            // float64 is needed to be nanosecond accurate for fractions of hours
            value += (fraction as f64 * (unit as f64 / scale)) as u64;
            if value > MAX_MAGNITUDE {
                return Err(invalid(orig));
            }
        }
        total = total
            .checked_add(value)
            .filter(|t| *t <= MAX_MAGNITUDE)
            .ok_or_else(|| invalid(orig))?;
    }

    let nanos = if negative {
        // MAX_MAGNITUDE itself maps to i64::MIN
        0_i64.wrapping_sub_unsigned(total)
    } else {
        i64::try_from(total).map_err(|_| invalid(orig))?
    };
    Ok(SignedDuration::from_nanos(nanos))
}
