use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// `strftime` layout of a release timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Width of a release timestamp in characters.
pub const TIMESTAMP_LEN: usize = 14;

/// Release timestamp: 14 ASCII digits, `YYYYMMDDHHMMSS`, always UTC.
///
/// The fixed width means lexicographic order of the string is the same as
/// chronological order, so `Ord` compares the raw text and "latest" is a
/// plain maximum.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(String);

impl Timestamp {
    /// Parse and validate a timestamp string.
    pub fn parse(value: &str) -> TypeResult<Self> {
        if value.len() != TIMESTAMP_LEN {
            return Err(TypeError::InvalidTimestamp {
                value: value.to_string(),
                reason: format!("expected {TIMESTAMP_LEN} digits, got {}", value.len()),
            });
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::InvalidTimestamp {
                value: value.to_string(),
                reason: "must contain only ASCII digits".into(),
            });
        }
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| {
            TypeError::InvalidTimestamp {
                value: value.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self(value.to_string()))
    }

    /// Returns `true` if `segment` is a well-formed timestamp.
    pub fn is_timestamp(segment: &str) -> bool {
        Self::parse(segment).is_ok()
    }

    /// The current wall-clock time in UTC.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Format a UTC instant, truncating sub-second precision.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(TIMESTAMP_FORMAT).to_string())
    }

    /// Convert back into a UTC instant.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        // Validated on construction.
        NaiveDateTime::parse_from_str(&self.0, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Timestamp {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl AsRef<str> for Timestamp {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
