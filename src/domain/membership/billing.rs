//! Billing calculator: net amount to VAT and gross, in integer cents.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::domain::foundation::{Money, ValidationError};

/// VAT rate in basis points (`1900` = 19 %), so fractional rates stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VatRate(u32);

impl VatRate {
    pub const STANDARD: VatRate = VatRate(1900);

    pub fn from_basis_points(bp: u32) -> Self {
        Self(bp)
    }

    /// Parses a percentage such as `19`, `7` or `7.7`.
    pub fn from_percent_str(input: &str) -> Result<Self, ValidationError> {
        // A percentage with two decimals has the same digits as an amount in cents.
        let bp = Money::parse_decimal("mwst_satz", input)?.cents();
        if !(0..=10_000).contains(&bp) {
            return Err(ValidationError::out_of_range("mwst_satz", 0, 100, bp / 100));
        }
        Ok(Self(bp as u32))
    }

    pub fn basis_points(&self) -> u32 {
        self.0
    }

    pub fn as_percent(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Default for VatRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl fmt::Display for VatRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}", self.0 / 100)
        } else {
            write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
        }
    }
}

impl Serialize for VatRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_percent())
    }
}

impl<'de> Deserialize<'de> for VatRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let text = match &value {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.clone(),
            _ => return Err(serde::de::Error::custom("mwst_satz must be a number")),
        };
        VatRate::from_percent_str(&text).map_err(serde::de::Error::custom)
    }
}

/// Result of [`compute_brutto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingBreakdown {
    pub betrag_netto: Money,
    pub mwst_satz: VatRate,
    pub mwst_betrag: Money,
    pub betrag_brutto: Money,
}

/// Computes VAT and gross from a net amount.
///
/// `mwst = round_half_up(netto * rate)` to the cent (half away from zero for
/// credit notes), `brutto = netto + mwst`. Fails when the gross amount does
/// not fit into the cent range.
pub fn compute_brutto(netto: Money, rate: VatRate) -> Result<BillingBreakdown, ValidationError> {
    let product = netto.cents() as i128 * rate.basis_points() as i128;
    let half = 5_000i128;
    let vat = if product >= 0 {
        (product + half) / 10_000
    } else {
        (product - half) / 10_000
    };
    let mwst = i64::try_from(vat)
        .ok()
        .map(Money::from_cents)
        .ok_or_else(|| ValidationError::invalid_format("mwst_betrag", "amount too large"))?;
    let brutto = netto
        .checked_add(mwst)
        .ok_or_else(|| ValidationError::invalid_format("betrag_brutto", "amount too large"))?;
    Ok(BillingBreakdown {
        betrag_netto: netto,
        mwst_satz: rate,
        mwst_betrag: mwst,
        betrag_brutto: brutto,
    })
}
