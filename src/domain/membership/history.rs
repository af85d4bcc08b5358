//! Append-only audit trail entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    Actor, HistoryEntryId, MembershipId, Timestamp, ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Erstellt,
    Verlaengert,
    Geaendert,
    Gekuendigt,
    Reaktiviert,
    SepaAngelegt,
    SepaGeaendert,
    Zahlung,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Erstellt => "erstellt",
            HistoryAction::Verlaengert => "verlaengert",
            HistoryAction::Geaendert => "geaendert",
            HistoryAction::Gekuendigt => "gekuendigt",
            HistoryAction::Reaktiviert => "reaktiviert",
            HistoryAction::SepaAngelegt => "sepa_angelegt",
            HistoryAction::SepaGeaendert => "sepa_geaendert",
            HistoryAction::Zahlung => "zahlung",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "erstellt" => Ok(HistoryAction::Erstellt),
            "verlaengert" => Ok(HistoryAction::Verlaengert),
            "geaendert" => Ok(HistoryAction::Geaendert),
            "gekuendigt" => Ok(HistoryAction::Gekuendigt),
            "reaktiviert" => Ok(HistoryAction::Reaktiviert),
            "sepa_angelegt" => Ok(HistoryAction::SepaAngelegt),
            "sepa_geaendert" => Ok(HistoryAction::SepaGeaendert),
            "zahlung" => Ok(HistoryAction::Zahlung),
            other => Err(ValidationError::invalid_format(
                "aktion",
                format!("unknown history action '{}'", other),
            )),
        }
    }
}

/// A stored history entry. There is no way to change one after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub verbandsmitgliedschaft_id: MembershipId,
    pub aktion: HistoryAction,
    pub beschreibung: String,
    pub alte_werte: Option<Value>,
    pub neue_werte: Option<Value>,
    pub durchgefuehrt_von: String,
    pub ip_adresse: Option<String>,
    pub created_at: Timestamp,
}

/// A history entry about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub membership_id: MembershipId,
    pub aktion: HistoryAction,
    pub beschreibung: String,
    pub alte_werte: Option<Value>,
    pub neue_werte: Option<Value>,
    pub durchgefuehrt_von: String,
    pub ip_adresse: Option<String>,
}

impl NewHistoryEntry {
    pub fn new(
        membership_id: MembershipId,
        aktion: HistoryAction,
        beschreibung: impl Into<String>,
        actor: &Actor,
    ) -> Self {
        Self {
            membership_id,
            aktion,
            beschreibung: beschreibung.into(),
            alte_werte: None,
            neue_werte: None,
            durchgefuehrt_von: actor.name.clone(),
            ip_adresse: actor.ip.clone(),
        }
    }

    pub fn with_before(mut self, before: Value) -> Self {
        self.alte_werte = Some(before);
        self
    }

    pub fn with_after(mut self, after: Value) -> Self {
        self.neue_werte = Some(after);
        self
    }
}
