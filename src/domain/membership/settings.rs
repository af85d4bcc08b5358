//! Typed association settings (`verband_einstellungen`).
//!
//! Values are stored as text together with a type tag and parsed on read.
//! [`VerbandSettings`] is the resolved snapshot lifecycle operations use.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{Money, Timestamp, ValidationError};

use super::{MembershipKind, VatRate};

pub mod keys {
    pub const PREIS_DOJO: &str = "preis_dojo_mitgliedschaft";
    pub const PREIS_EINZEL: &str = "preis_einzel_mitgliedschaft";
    pub const MWST_SATZ: &str = "mwst_satz";
    pub const LAUFZEIT_MONATE: &str = "laufzeit_monate";
    pub const ZAHLUNGSZIEL_TAGE: &str = "zahlungsziel_tage";
    pub const UNTERSCHRIFT_ERFORDERLICH: &str = "unterschrift_erforderlich";
    pub const VERBAND_NAME: &str = "verband_name";
    pub const VERBAND_KUERZEL: &str = "verband_kuerzel";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Number,
    Boolean,
    String,
    Json,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Number => "number",
            SettingType::Boolean => "boolean",
            SettingType::String => "string",
            SettingType::Json => "json",
        }
    }
}

impl FromStr for SettingType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(SettingType::Number),
            "boolean" => Ok(SettingType::Boolean),
            "string" => Ok(SettingType::String),
            "json" => Ok(SettingType::Json),
            other => Err(ValidationError::invalid_format(
                "typ",
                format!("unknown setting type '{}'", other),
            )),
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Number(Number),
    Boolean(bool),
    String(String),
    Json(Value),
}

impl SettingValue {
    pub fn typ(&self) -> SettingType {
        match self {
            SettingValue::Number(_) => SettingType::Number,
            SettingValue::Boolean(_) => SettingType::Boolean,
            SettingValue::String(_) => SettingType::String,
            SettingValue::Json(_) => SettingType::Json,
        }
    }

    /// Parses the stored text representation.
    pub fn parse_stored(typ: SettingType, raw: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::invalid_format("wert", reason);
        match typ {
            SettingType::Number => serde_json::from_str::<Number>(raw.trim())
                .map(SettingValue::Number)
                .map_err(|_| invalid(format!("'{}' is not a number", raw))),
            SettingType::Boolean => match raw.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(SettingValue::Boolean(true)),
                "false" | "0" => Ok(SettingValue::Boolean(false)),
                _ => Err(invalid(format!("'{}' is not a boolean", raw))),
            },
            SettingType::String => Ok(SettingValue::String(raw.to_string())),
            SettingType::Json => serde_json::from_str(raw)
                .map(SettingValue::Json)
                .map_err(|e| invalid(format!("invalid JSON: {}", e))),
        }
    }

    /// Converts a JSON request value into a setting of the given type.
    ///
    /// Numbers and booleans may also arrive as strings (`"99.00"`, `"true"`).
    pub fn from_json(typ: SettingType, value: &Value) -> Result<Self, ValidationError> {
        match (typ, value) {
            (SettingType::Number, Value::Number(n)) => Ok(SettingValue::Number(n.clone())),
            (SettingType::Boolean, Value::Bool(b)) => Ok(SettingValue::Boolean(*b)),
            (SettingType::String, Value::String(s)) => Ok(SettingValue::String(s.clone())),
            (SettingType::Json, v) => Ok(SettingValue::Json(v.clone())),
            (SettingType::Number | SettingType::Boolean, Value::String(s)) => {
                Self::parse_stored(typ, s)
            }
            (typ, other) => Err(ValidationError::invalid_format(
                "wert",
                format!("expected {}, got {}", typ, other),
            )),
        }
    }

    /// Text written to the `wert` column.
    pub fn to_stored(&self) -> String {
        match self {
            SettingValue::Number(n) => n.to_string(),
            SettingValue::Boolean(b) => b.to_string(),
            SettingValue::String(s) => s.clone(),
            SettingValue::Json(v) => v.to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SettingValue::Number(n) => Value::Number(n.clone()),
            SettingValue::Boolean(b) => Value::Bool(*b),
            SettingValue::String(s) => Value::String(s.clone()),
            SettingValue::Json(v) => v.clone(),
        }
    }

    pub fn as_money(&self) -> Option<Money> {
        match self {
            SettingValue::Number(n) => Money::parse_decimal("wert", &n.to_string()).ok(),
            _ => None,
        }
    }

    /// Whole number; `12.0` counts, `12.5` does not.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        }
    }

    pub fn as_vat_rate(&self) -> Option<VatRate> {
        match self {
            SettingValue::Number(n) => VatRate::from_percent_str(&n.to_string()).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A stored setting row.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub schluessel: String,
    pub wert: SettingValue,
    pub beschreibung: Option<String>,
    pub updated_at: Timestamp,
}

/// Keys the service knows, with type, default and description.
pub fn known_settings() -> Vec<(&'static str, SettingValue, &'static str)> {
    vec![
        (
            keys::PREIS_DOJO,
            SettingValue::Number(Number::from(99)),
            "Jahresbeitrag Dojo-Mitgliedschaft (netto, EUR)",
        ),
        (
            keys::PREIS_EINZEL,
            SettingValue::Number(Number::from(49)),
            "Jahresbeitrag Einzelmitgliedschaft (netto, EUR)",
        ),
        (
            keys::MWST_SATZ,
            SettingValue::Number(Number::from(19)),
            "Mehrwertsteuersatz in Prozent",
        ),
        (
            keys::LAUFZEIT_MONATE,
            SettingValue::Number(Number::from(12)),
            "Vertragslaufzeit in Monaten",
        ),
        (
            keys::ZAHLUNGSZIEL_TAGE,
            SettingValue::Number(Number::from(14)),
            "Zahlungsziel in Tagen",
        ),
        (
            keys::UNTERSCHRIFT_ERFORDERLICH,
            SettingValue::Boolean(false),
            "Digitale Unterschrift bei Anmeldung erforderlich",
        ),
        (
            keys::VERBAND_NAME,
            SettingValue::String("Tiger & Dragon Association".to_string()),
            "Name des Verbands",
        ),
        (
            keys::VERBAND_KUERZEL,
            SettingValue::String("TDA".to_string()),
            "Kürzel für Mitgliedsnummern",
        ),
    ]
}

/// Upper bound for configured annual fees (100 000 EUR).
pub const MAX_ANNUAL_FEE: Money = Money::from_cents(10_000_000);

/// Range and type checks for known keys; unknown keys are only type-checked
/// by the caller.
pub fn validate_known(key: &str, value: &SettingValue) -> Result<(), ValidationError> {
    let expected = known_settings()
        .into_iter()
        .find(|(k, _, _)| *k == key)
        .map(|(_, v, _)| v.typ());
    let Some(expected) = expected else {
        return Ok(());
    };
    if value.typ() != expected {
        return Err(ValidationError::invalid_format(
            key,
            format!("expected {}, got {}", expected, value.typ()),
        ));
    }
    match key {
        keys::PREIS_DOJO | keys::PREIS_EINZEL => match value.as_money() {
            Some(m) if !m.is_negative() && m <= MAX_ANNUAL_FEE => Ok(()),
            Some(m) => Err(ValidationError::out_of_range(
                key,
                0,
                MAX_ANNUAL_FEE.cents(),
                m.cents(),
            )),
            None => Err(ValidationError::invalid_format(key, "must be an amount")),
        },
        keys::MWST_SATZ => value
            .as_vat_rate()
            .map(|_| ())
            .ok_or_else(|| ValidationError::invalid_format(key, "must be between 0 and 100")),
        keys::LAUFZEIT_MONATE => in_range(key, value, 1, 120),
        keys::ZAHLUNGSZIEL_TAGE => in_range(key, value, 0, 365),
        keys::VERBAND_NAME | keys::VERBAND_KUERZEL => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(()),
            _ => Err(ValidationError::empty_field(key)),
        },
        _ => Ok(()),
    }
}

fn in_range(key: &str, value: &SettingValue, min: i64, max: i64) -> Result<(), ValidationError> {
    match value.as_i64() {
        Some(v) if (min..=max).contains(&v) => Ok(()),
        Some(v) => Err(ValidationError::out_of_range(key, min, max, v)),
        None => Err(ValidationError::invalid_format(key, "must be a whole number")),
    }
}

/// Resolved settings snapshot for one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct VerbandSettings {
    pub preis_dojo: Money,
    pub preis_einzel: Money,
    pub mwst_satz: VatRate,
    pub laufzeit_monate: u32,
    pub zahlungsziel_tage: u32,
    pub unterschrift_erforderlich: bool,
    pub verband_name: String,
    pub verband_kuerzel: String,
}

impl Default for VerbandSettings {
    fn default() -> Self {
        Self {
            preis_dojo: Money::from_cents(9900),
            preis_einzel: Money::from_cents(4900),
            mwst_satz: VatRate::STANDARD,
            laufzeit_monate: 12,
            zahlungsziel_tage: 14,
            unterschrift_erforderlich: false,
            verband_name: "Tiger & Dragon Association".to_string(),
            verband_kuerzel: "TDA".to_string(),
        }
    }
}

impl VerbandSettings {
    /// Builds the snapshot from a lookup; missing or ill-typed values fall
    /// back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<SettingValue>,
    {
        let d = Self::default();
        let checked = |key: &str| lookup(key).filter(|v| validate_known(key, v).is_ok());
        Self {
            preis_dojo: checked(keys::PREIS_DOJO)
                .and_then(|v| v.as_money())
                .unwrap_or(d.preis_dojo),
            preis_einzel: checked(keys::PREIS_EINZEL)
                .and_then(|v| v.as_money())
                .unwrap_or(d.preis_einzel),
            mwst_satz: checked(keys::MWST_SATZ)
                .and_then(|v| v.as_vat_rate())
                .unwrap_or(d.mwst_satz),
            laufzeit_monate: checked(keys::LAUFZEIT_MONATE)
                .and_then(|v| v.as_i64())
                .map(|v| v as u32)
                .unwrap_or(d.laufzeit_monate),
            zahlungsziel_tage: checked(keys::ZAHLUNGSZIEL_TAGE)
                .and_then(|v| v.as_i64())
                .map(|v| v as u32)
                .unwrap_or(d.zahlungsziel_tage),
            unterschrift_erforderlich: checked(keys::UNTERSCHRIFT_ERFORDERLICH)
                .and_then(|v| v.as_bool())
                .unwrap_or(d.unterschrift_erforderlich),
            verband_name: checked(keys::VERBAND_NAME)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or(d.verband_name),
            verband_kuerzel: checked(keys::VERBAND_KUERZEL)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or(d.verband_kuerzel),
        }
    }

    /// Annual fee for a membership kind.
    pub fn price_for(&self, kind: MembershipKind) -> Money {
        match kind {
            MembershipKind::Dojo => self.preis_dojo,
            MembershipKind::Einzelperson => self.preis_einzel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn parses_stored_text_by_type() {
        assert_eq!(
            SettingValue::parse_stored(SettingType::Number, "99.00")
                .unwrap()
                .as_money(),
            Some(Money::from_cents(9900))
        );
        assert_eq!(
            SettingValue::parse_stored(SettingType::Boolean, "TRUE").unwrap(),
            SettingValue::Boolean(true)
        );
        assert!(SettingValue::parse_stored(SettingType::Number, "neunzig").is_err());
        assert!(SettingValue::parse_stored(SettingType::Json, "{").is_err());
    }

    #[test]
    fn stored_text_round_trips() {
        let v = SettingValue::Json(json!({"a": [1, 2]}));
        let back = SettingValue::parse_stored(SettingType::Json, &v.to_stored()).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn from_json_accepts_numeric_strings() {
        let v = SettingValue::from_json(SettingType::Number, &json!("49.90")).unwrap();
        assert_eq!(v.as_money(), Some(Money::from_cents(4990)));
        assert!(SettingValue::from_json(SettingType::Boolean, &json!(3)).is_err());
    }

    #[test]
    fn validate_known_checks_type_and_range() {
        assert!(validate_known(keys::LAUFZEIT_MONATE, &SettingValue::Number(0.into())).is_err());
        assert!(validate_known(keys::LAUFZEIT_MONATE, &SettingValue::Number(24.into())).is_ok());
        assert!(validate_known(keys::MWST_SATZ, &SettingValue::Number(150.into())).is_err());
        assert!(validate_known(keys::UNTERSCHRIFT_ERFORDERLICH, &SettingValue::String("ja".into())).is_err());
        assert!(validate_known("eigener_schluessel", &SettingValue::String("x".into())).is_ok());
    }

    #[test]
    fn prices_are_capped() {
        let huge = SettingValue::Number(90_000_000_000_000_000u64.into());
        assert!(validate_known(keys::PREIS_DOJO, &huge).is_err());
        assert!(validate_known(keys::PREIS_EINZEL, &SettingValue::Number((-1).into())).is_err());
        assert!(validate_known(keys::PREIS_DOJO, &SettingValue::Number(100_000.into())).is_ok());
        assert!(validate_known(keys::PREIS_DOJO, &SettingValue::Number(100_001.into())).is_err());

        let mut store = HashMap::new();
        store.insert(keys::PREIS_DOJO, huge);
        let s = VerbandSettings::from_lookup(|k| store.get(k).cloned());
        assert_eq!(s.preis_dojo, Money::from_cents(9900));
    }

    #[test]
    fn snapshot_uses_defaults_when_store_is_empty() {
        let s = VerbandSettings::from_lookup(|_| None);
        assert_eq!(s, VerbandSettings::default());
        assert_eq!(s.price_for(MembershipKind::Dojo), Money::from_cents(9900));
    }

    #[test]
    fn snapshot_ignores_ill_typed_values() {
        let mut store = HashMap::new();
        store.insert(keys::PREIS_DOJO, SettingValue::String("teuer".into()));
        store.insert(keys::LAUFZEIT_MONATE, SettingValue::Number(24.into()));
        let s = VerbandSettings::from_lookup(|k| store.get(k).cloned());
        assert_eq!(s.preis_dojo, Money::from_cents(9900));
        assert_eq!(s.laufzeit_monate, 24);
    }

    #[test]
    fn known_defaults_agree_with_snapshot_defaults() {
        let map: HashMap<_, _> = known_settings().into_iter().map(|(k, v, _)| (k, v)).collect();
        let s = VerbandSettings::from_lookup(|k| map.get(k).cloned());
        assert_eq!(s, VerbandSettings::default());
    }
}
