//! Invoice numbers: `YYYY/MM/DD-XXXX`.
//!
//! `XXXX` is `1000 + n`, where `n` counts invoice numbers already issued in
//! the same calendar year by any invoice source sharing the counter.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    pub const BASE: i64 = 1000;

    /// Builds the number for the `issued`-th invoice of the year (1-based,
    /// as returned by the per-year counter).
    pub fn format(date: NaiveDate, issued: i64) -> Result<Self, ValidationError> {
        if issued < 1 {
            return Err(ValidationError::out_of_range("rechnungsnummer", 1, i64::MAX, issued));
        }
        Ok(Self(format!(
            "{:04}/{:02}/{:02}-{}",
            date.year(),
            date.month(),
            date.day(),
            Self::BASE + issued - 1
        )))
    }

    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Calendar year encoded in the number, if it is well formed.
    pub fn year(&self) -> Option<i32> {
        self.0.get(0..4)?.parse().ok()
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_invoice_of_the_year_is_1000() {
        let n = InvoiceNumber::format(date(2026, 3, 5), 1).unwrap();
        assert_eq!(n.as_str(), "2026/03/05-1000");
    }

    #[test]
    fn counts_up_from_the_base() {
        let n = InvoiceNumber::format(date(2026, 12, 31), 57).unwrap();
        assert_eq!(n.as_str(), "2026/12/31-1056");
        assert_eq!(n.year(), Some(2026));
    }

    #[test]
    fn widens_past_four_digits() {
        let n = InvoiceNumber::format(date(2027, 1, 2), 9_001).unwrap();
        assert_eq!(n.as_str(), "2027/01/02-10000");
    }

    #[test]
    fn rejects_non_positive_counter() {
        assert!(InvoiceNumber::format(date(2026, 1, 1), 0).is_err());
    }
}
