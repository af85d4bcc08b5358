//! Consent flags and the captured signature.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, ValidationError};

/// Acceptance of terms and privacy policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consent {
    pub agb_akzeptiert: bool,
    pub datenschutz_akzeptiert: bool,
}

impl Consent {
    pub fn new(agb_akzeptiert: bool, datenschutz_akzeptiert: bool) -> Self {
        Self {
            agb_akzeptiert,
            datenschutz_akzeptiert,
        }
    }

    /// Both flags must be set before a membership can be registered or signed.
    pub fn require_complete(&self) -> Result<(), ValidationError> {
        if !self.agb_akzeptiert {
            return Err(ValidationError::invalid_format(
                "agb_akzeptiert",
                "terms and conditions must be accepted",
            ));
        }
        if !self.datenschutz_akzeptiert {
            return Err(ValidationError::invalid_format(
                "datenschutz_akzeptiert",
                "privacy policy must be accepted",
            ));
        }
        Ok(())
    }
}

/// A captured digital signature (typically a data URL of the drawn image).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub unterschrift_digital: Option<String>,
    pub unterschrift_datum: Option<Timestamp>,
    pub unterschrift_ip: Option<String>,
}

impl Signature {
    /// Signature captured now from the given blob.
    pub fn captured(blob: impl Into<String>, ip: Option<String>) -> Result<Self, ValidationError> {
        let blob = blob.into();
        if blob.trim().is_empty() {
            return Err(ValidationError::empty_field("unterschrift_digital"));
        }
        Ok(Self {
            unterschrift_digital: Some(blob),
            unterschrift_datum: Some(Timestamp::now()),
            unterschrift_ip: ip,
        })
    }

    pub fn is_present(&self) -> bool {
        self.unterschrift_digital
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}
