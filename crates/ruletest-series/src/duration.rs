//! Compact duration strings.
//!
//! Durations at the YAML and query boundary use unit-suffixed integer
//! segments in descending unit order: `5m`, `1h30m`, `90s`, `1d`,
//! `2m59s999ms`. Bare `0` is the zero duration. Internally everything is
//! integer milliseconds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{Result, SeriesError};

/// Recognized units, largest first. `w` and `y` parse but format as days.
const UNITS: [(&str, i64); 7] = [
    ("y", 31_536_000_000),
    ("w", 604_800_000),
    ("d", 86_400_000),
    ("h", 3_600_000),
    ("m", 60_000),
    ("s", 1_000),
    ("ms", 1),
];

/// A duration (or offset from the simulated epoch) in milliseconds, parsed
/// from and formatted as the compact string form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompactDuration(i64);

impl CompactDuration {
    /// Wraps a millisecond count.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Returns `true` for the zero duration.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl FromStr for CompactDuration {
    type Err = SeriesError;

    fn from_str(text: &str) -> Result<Self> {
        if text == "0" {
            return Ok(Self(0));
        }
        let invalid = |reason: &str| SeriesError::InvalidDuration {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        if text.is_empty() {
            return Err(invalid("empty duration"));
        }

        let chars: Vec<char> = text.chars().collect();
        let mut index = 0;
        let mut total: i64 = 0;
        // Units must appear in strictly descending order, each at most once.
        let mut last_rank = usize::MAX;

        while index < chars.len() {
            let digit_start = index;
            while index < chars.len() && chars[index].is_ascii_digit() {
                index += 1;
            }
            if index == digit_start {
                return Err(invalid(&format!("expected digits at '{}'", chars[index])));
            }
            let digits: String = chars[digit_start..index].iter().collect();
            let amount: i64 = digits
                .parse()
                .map_err(|_| invalid(&format!("segment '{digits}' is out of range")))?;

            let unit_start = index;
            while index < chars.len() && chars[index].is_ascii_alphabetic() {
                index += 1;
            }
            let unit: String = chars[unit_start..index].iter().collect();
            if unit.is_empty() {
                return Err(invalid("missing unit"));
            }
            let rank = UNITS
                .iter()
                .position(|(name, _)| *name == unit)
                .ok_or_else(|| invalid(&format!("unknown unit '{unit}'")))?;
            if rank >= last_rank {
                return Err(invalid("units must be in descending order without repeats"));
            }
            last_rank = rank;

            total = amount
                .checked_mul(UNITS[rank].1)
                .and_then(|segment| total.checked_add(segment))
                .ok_or_else(|| invalid("duration overflows"))?;
        }

        Ok(Self(total))
    }
}

impl fmt::Display for CompactDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "0");
        }
        let mut rest = self.0;
        let mut out = String::new();
        // Weeks and years fold into days on output.
        for (name, millis) in UNITS.iter().skip(2) {
            let amount = rest / millis;
            if amount > 0 {
                out.push_str(&format!("{amount}{name}"));
                rest -= amount * millis;
            }
        }
        write!(f, "{out}")
    }
}

impl Serialize for CompactDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CompactDuration {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }
}

/// YAML writes the zero duration as a bare `0` scalar, which deserializers
/// hand over as an integer rather than a string. Any other number still
/// needs a unit.
struct DurationVisitor;

impl de::Visitor<'_> for DurationVisitor {
    type Value = CompactDuration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a compact duration string such as \"5m\" or \"1h30m\"")
    }

    fn visit_str<E: de::Error>(self, text: &str) -> std::result::Result<Self::Value, E> {
        text.parse().map_err(de::Error::custom)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Self::Value, E> {
        if value == 0 {
            Ok(CompactDuration(0))
        } else {
            Err(de::Error::custom(format!(
                "duration '{value}' is missing a unit"
            )))
        }
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Self::Value, E> {
        if value == 0 {
            Ok(CompactDuration(0))
        } else {
            Err(de::Error::custom(format!(
                "duration '{value}' is missing a unit"
            )))
        }
    }
}
