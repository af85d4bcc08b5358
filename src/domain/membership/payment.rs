//! Membership payments: one invoice per billing period.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    MembershipId, Money, PaymentId, StateMachine, Timestamp, ValidationError,
};

use super::{BillingBreakdown, InvoiceNumber, VatRate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "offen")]
    Open,
    #[serde(rename = "bezahlt")]
    Paid,
    #[serde(rename = "storniert")]
    Voided,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Open => "offen",
            PaymentStatus::Paid => "bezahlt",
            PaymentStatus::Voided => "storniert",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offen" => Ok(PaymentStatus::Open),
            "bezahlt" => Ok(PaymentStatus::Paid),
            "storniert" => Ok(PaymentStatus::Voided),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown payment status '{}'", other),
            )),
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!((self, target), (Open, Paid) | (Open, Voided))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Open => vec![Paid, Voided],
            Paid | Voided => vec![],
        }
    }
}

/// How a membership (or a single payment) is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Rechnung,
    Sepa,
    Ueberweisung,
    Bar,
    Paypal,
    Stripe,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Rechnung => "rechnung",
            PaymentMethod::Sepa => "sepa",
            PaymentMethod::Ueberweisung => "ueberweisung",
            PaymentMethod::Bar => "bar",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Stripe => "stripe",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rechnung" => Ok(PaymentMethod::Rechnung),
            "sepa" => Ok(PaymentMethod::Sepa),
            "ueberweisung" => Ok(PaymentMethod::Ueberweisung),
            "bar" => Ok(PaymentMethod::Bar),
            "paypal" => Ok(PaymentMethod::Paypal),
            "stripe" => Ok(PaymentMethod::Stripe),
            other => Err(ValidationError::invalid_format(
                "zahlungsart",
                format!("unknown payment method '{}'", other),
            )),
        }
    }
}

/// A payment as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub verbandsmitgliedschaft_id: MembershipId,
    pub rechnungsnummer: InvoiceNumber,
    pub rechnungsdatum: NaiveDate,
    pub faellig_am: NaiveDate,
    pub betrag_netto: Money,
    pub mwst_satz: VatRate,
    pub mwst_betrag: Money,
    pub betrag_brutto: Money,
    pub zeitraum_von: NaiveDate,
    pub zeitraum_bis: NaiveDate,
    pub status: PaymentStatus,
    pub bezahlt_am: Option<Timestamp>,
    pub zahlungsart: Option<PaymentMethod>,
    pub transaktions_id: Option<String>,
    pub created_at: Timestamp,
}

impl Payment {
    /// Marks the payment as paid.
    pub fn confirm(
        &mut self,
        method: Option<PaymentMethod>,
        transaction_ref: Option<String>,
    ) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(PaymentStatus::Paid)?;
        self.bezahlt_am = Some(Timestamp::now());
        if method.is_some() {
            self.zahlungsart = method;
        }
        self.transaktions_id = transaction_ref.filter(|r| !r.trim().is_empty());
        Ok(())
    }

    /// Voids an open payment (fee exemption, cancellation of the invoice).
    pub fn void(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(PaymentStatus::Voided)?;
        Ok(())
    }
}

/// A payment about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub membership_id: MembershipId,
    pub rechnungsnummer: InvoiceNumber,
    pub rechnungsdatum: NaiveDate,
    pub faellig_am: NaiveDate,
    pub billing: BillingBreakdown,
    pub zeitraum_von: NaiveDate,
    pub zeitraum_bis: NaiveDate,
    pub zahlungsart: PaymentMethod,
}

impl NewPayment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.zeitraum_von >= self.zeitraum_bis {
            return Err(ValidationError::invalid_format(
                "zeitraum_bis",
                "billing period must end after it starts",
            ));
        }
        if self.faellig_am < self.rechnungsdatum {
            return Err(ValidationError::invalid_format(
                "faellig_am",
                "due date precedes invoice date",
            ));
        }
        if self.billing.betrag_netto.is_negative() {
            return Err(ValidationError::invalid_format("betrag_netto", "must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::membership::compute_brutto;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_payment() -> Payment {
        let billing = compute_brutto(Money::from_cents(9900), VatRate::STANDARD).unwrap();
        Payment {
            id: PaymentId::new(1).unwrap(),
            verbandsmitgliedschaft_id: MembershipId::new(1).unwrap(),
            rechnungsnummer: InvoiceNumber::from_stored("2026/01/10-1000"),
            rechnungsdatum: date(2026, 1, 10),
            faellig_am: date(2026, 1, 24),
            betrag_netto: billing.betrag_netto,
            mwst_satz: billing.mwst_satz,
            mwst_betrag: billing.mwst_betrag,
            betrag_brutto: billing.betrag_brutto,
            zeitraum_von: date(2026, 1, 10),
            zeitraum_bis: date(2027, 1, 10),
            status: PaymentStatus::Open,
            bezahlt_am: None,
            zahlungsart: Some(PaymentMethod::Rechnung),
            transaktions_id: None,
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn open_payment_can_be_confirmed_once() {
        let mut p = open_payment();
        p.confirm(Some(PaymentMethod::Ueberweisung), Some("TX-1".into())).unwrap();
        assert_eq!(p.status, PaymentStatus::Paid);
        assert!(p.bezahlt_am.is_some());
        assert_eq!(p.zahlungsart, Some(PaymentMethod::Ueberweisung));
        assert_eq!(p.transaktions_id.as_deref(), Some("TX-1"));

        assert!(p.confirm(None, None).is_err());
    }

    #[test]
    fn confirm_without_method_keeps_previous_method() {
        let mut p = open_payment();
        p.confirm(None, None).unwrap();
        assert_eq!(p.zahlungsart, Some(PaymentMethod::Rechnung));
    }

    #[test]
    fn paid_payment_cannot_be_voided() {
        let mut p = open_payment();
        p.confirm(None, None).unwrap();
        assert!(p.void().is_err());
    }

    #[test]
    fn voided_is_terminal() {
        assert!(PaymentStatus::Voided.is_terminal());
        assert!(PaymentStatus::Paid.is_terminal());
    }

    #[test]
    fn new_payment_requires_forward_period() {
        let np = NewPayment {
            membership_id: MembershipId::new(1).unwrap(),
            rechnungsnummer: InvoiceNumber::from_stored("2026/01/10-1000"),
            rechnungsdatum: date(2026, 1, 10),
            faellig_am: date(2026, 1, 24),
            billing: compute_brutto(Money::from_cents(9900), VatRate::STANDARD).unwrap(),
            zeitraum_von: date(2026, 1, 10),
            zeitraum_bis: date(2026, 1, 10),
            zahlungsart: PaymentMethod::Rechnung,
        };
        assert_eq!(np.validate().unwrap_err().field(), "zeitraum_bis");
    }

    #[test]
    fn payment_method_wire_names() {
        assert_eq!("ueberweisung".parse::<PaymentMethod>(), Ok(PaymentMethod::Ueberweisung));
        assert_eq!(serde_json::to_string(&PaymentMethod::Sepa).unwrap(), "\"sepa\"");
        assert!("crypto".parse::<PaymentMethod>().is_err());
    }
}
