//! GetPublicConfigHandler - Prices and terms for the public registration form.
//!
//! Never fails: when the settings store is unavailable, or the stored prices
//! cannot be billed, the defaults are shown.

use serde::Serialize;
use std::sync::Arc;

use crate::domain::foundation::{Money, ValidationError};
use crate::domain::membership::{compute_brutto, VatRate, VerbandSettings};
use crate::ports::SettingsResolver;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicConfig {
    pub verband_name: String,
    pub preis_dojo: Money,
    pub preis_dojo_brutto: Money,
    pub preis_einzel: Money,
    pub preis_einzel_brutto: Money,
    pub mwst_satz: VatRate,
    pub laufzeit_monate: u32,
    pub zahlungsziel_tage: u32,
    pub unterschrift_erforderlich: bool,
}

impl PublicConfig {
    /// Default settings with their gross prices at 19 %.
    fn fallback() -> Self {
        let s = VerbandSettings::default();
        Self {
            preis_dojo_brutto: Money::from_cents(11781),
            preis_einzel_brutto: Money::from_cents(5831),
            preis_dojo: s.preis_dojo,
            preis_einzel: s.preis_einzel,
            mwst_satz: s.mwst_satz,
            laufzeit_monate: s.laufzeit_monate,
            zahlungsziel_tage: s.zahlungsziel_tage,
            unterschrift_erforderlich: s.unterschrift_erforderlich,
            verband_name: s.verband_name,
        }
    }
}

impl TryFrom<VerbandSettings> for PublicConfig {
    type Error = ValidationError;

    fn try_from(s: VerbandSettings) -> Result<Self, Self::Error> {
        Ok(Self {
            preis_dojo_brutto: compute_brutto(s.preis_dojo, s.mwst_satz)?.betrag_brutto,
            preis_einzel_brutto: compute_brutto(s.preis_einzel, s.mwst_satz)?.betrag_brutto,
            preis_dojo: s.preis_dojo,
            preis_einzel: s.preis_einzel,
            mwst_satz: s.mwst_satz,
            laufzeit_monate: s.laufzeit_monate,
            zahlungsziel_tage: s.zahlungsziel_tage,
            unterschrift_erforderlich: s.unterschrift_erforderlich,
            verband_name: s.verband_name,
        })
    }
}

pub struct GetPublicConfigHandler {
    settings: Arc<dyn SettingsResolver>,
}

impl GetPublicConfigHandler {
    pub fn new(settings: Arc<dyn SettingsResolver>) -> Self {
        Self { settings }
    }

    pub async fn handle(&self) -> PublicConfig {
        let stored = match self.settings.snapshot().await {
            Ok(settings) => PublicConfig::try_from(settings).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        stored.unwrap_or_else(|reason| {
            tracing::warn!(error = %reason, "Settings unusable, serving default public config");
            PublicConfig::fallback()
        })
    }
}
