//! Country name to ISO-3166 alpha-2 resolution for membership numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Two-letter country code embedded in membership numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode(String);

/// German names, English names and ISO codes the registration forms produce.
const COUNTRIES: &[(&str, &[&str])] = &[
    ("DE", &["deutschland", "germany", "de", "deu", "bundesrepublik deutschland"]),
    ("AT", &["österreich", "oesterreich", "austria", "at", "aut"]),
    ("CH", &["schweiz", "switzerland", "suisse", "ch", "che"]),
    ("NL", &["niederlande", "netherlands", "holland", "nl", "nld"]),
    ("BE", &["belgien", "belgium", "be", "bel"]),
    ("LU", &["luxemburg", "luxembourg", "lu", "lux"]),
    ("FR", &["frankreich", "france", "fr", "fra"]),
    ("IT", &["italien", "italy", "it", "ita"]),
    ("ES", &["spanien", "spain", "es", "esp"]),
    ("PT", &["portugal", "pt", "prt"]),
    ("PL", &["polen", "poland", "pl", "pol"]),
    ("CZ", &["tschechien", "czech republic", "czechia", "cz", "cze"]),
    ("DK", &["dänemark", "daenemark", "denmark", "dk", "dnk"]),
    ("SE", &["schweden", "sweden", "se", "swe"]),
    ("NO", &["norwegen", "norway", "no", "nor"]),
    ("FI", &["finnland", "finland", "fi", "fin"]),
    ("GB", &["großbritannien", "grossbritannien", "vereinigtes königreich", "united kingdom", "uk", "england", "gb", "gbr"]),
    ("IE", &["irland", "ireland", "ie", "irl"]),
    ("HU", &["ungarn", "hungary", "hu", "hun"]),
    ("GR", &["griechenland", "greece", "gr", "grc"]),
    ("TR", &["türkei", "tuerkei", "turkey", "türkiye", "tr", "tur"]),
    ("US", &["usa", "vereinigte staaten", "united states", "us"]),
    ("JP", &["japan", "jp", "jpn"]),
];

impl CountryCode {
    /// Placeholder for unknown or missing countries.
    pub const UNKNOWN: &'static str = "XX";

    /// Resolves free-text country input; unknown or missing input yields `XX`.
    pub fn resolve(input: Option<&str>) -> Self {
        let normalized = input
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .unwrap_or_default();
        if normalized.is_empty() {
            return Self(Self::UNKNOWN.to_string());
        }
        COUNTRIES
            .iter()
            .find(|(_, names)| names.contains(&normalized.as_str()))
            .map(|(code, _)| Self((*code).to_string()))
            .unwrap_or_else(|| Self(Self::UNKNOWN.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        self.0 != Self::UNKNOWN
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_german_and_english_names() {
        assert_eq!(CountryCode::resolve(Some("Deutschland")).as_str(), "DE");
        assert_eq!(CountryCode::resolve(Some("Germany")).as_str(), "DE");
        assert_eq!(CountryCode::resolve(Some("Österreich")).as_str(), "AT");
        assert_eq!(CountryCode::resolve(Some("switzerland")).as_str(), "CH");
    }

    #[test]
    fn ignores_case_and_surrounding_whitespace() {
        assert_eq!(CountryCode::resolve(Some("  deUTSCHland ")).as_str(), "DE");
        assert_eq!(CountryCode::resolve(Some("united   kingdom")).as_str(), "GB");
    }

    #[test]
    fn accepts_iso_codes() {
        assert_eq!(CountryCode::resolve(Some("nl")).as_str(), "NL");
        assert_eq!(CountryCode::resolve(Some("AT")).as_str(), "AT");
    }

    #[test]
    fn unknown_or_missing_becomes_placeholder() {
        assert_eq!(CountryCode::resolve(Some("Atlantis")).as_str(), "XX");
        assert_eq!(CountryCode::resolve(Some("   ")).as_str(), "XX");
        assert!(!CountryCode::resolve(None).is_known());
    }
}
