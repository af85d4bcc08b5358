//! Human-readable membership numbers: `TDA-DE-D-0001`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CountryCode, MembershipKind};

/// Membership number, immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipNumber(String);

impl MembershipNumber {
    pub const DEFAULT_PREFIX: &'static str = "TDA";

    /// Formats `<prefix>-<CC>-<D|E>-<seq>` with the sequence padded to four
    /// digits. Larger values widen instead of wrapping.
    ///
    /// A prefix with anything but ASCII letters and digits falls back to `TDA`.
    pub fn format(prefix: &str, country: &CountryCode, kind: MembershipKind, sequence: i64) -> Self {
        let prefix = prefix.trim().to_uppercase();
        let prefix = if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            prefix
        } else {
            Self::DEFAULT_PREFIX.to_string()
        };
        Self(format!(
            "{}-{}-{}-{:04}",
            prefix,
            country,
            kind.number_letter(),
            sequence
        ))
    }

    /// Wraps a number read back from the store.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MembershipNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
