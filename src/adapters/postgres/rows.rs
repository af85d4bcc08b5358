//! Row types shared by the Postgres store and reader.
//!
//! Amounts are stored in cents (`*_cent`), VAT rates in basis points
//! (`mwst_satz_bp`).

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::str::FromStr;

use crate::domain::foundation::{
    DojoId, DomainError, ErrorCode, HistoryEntryId, MandateId, MembershipId, Money, PaymentId,
    Timestamp,
};
use crate::domain::membership::{
    Consent, Contact, HistoryAction, HistoryEntry, Iban, InvoiceNumber, MandateReference,
    MandateSignature, MandateStatus, Membership, MembershipKind, MembershipNumber,
    MembershipStatus, Party, Payment, PaymentMethod, PaymentStatus, SepaMandate, SepaSnapshot,
    Signature, VatRate,
};

pub(crate) const MEMBERSHIP_COLUMNS: &str = r#"
    id, mitgliedsnummer, typ, status,
    dojo_id, dojo_name, dojo_inhaber, person_vorname, person_nachname, person_geburtsdatum,
    email, telefon, strasse, plz, ort, land,
    jahresbeitrag_cent, beitragsfrei, zahlungsart, sepa_iban, sepa_bic, sepa_kontoinhaber,
    gueltig_ab, gueltig_bis, agb_akzeptiert, datenschutz_akzeptiert,
    unterschrift_digital, unterschrift_datum, unterschrift_ip, notizen, created_at, updated_at
"#;

pub(crate) const PAYMENT_COLUMNS: &str = r#"
    id, verbandsmitgliedschaft_id, rechnungsnummer, rechnungsdatum, faellig_am,
    betrag_netto_cent, mwst_satz_bp, mwst_betrag_cent, betrag_brutto_cent,
    zeitraum_von, zeitraum_bis, status, bezahlt_am, zahlungsart, transaktions_id, created_at
"#;

pub(crate) const MANDATE_COLUMNS: &str = r#"
    id, verbandsmitgliedschaft_id, mandatsreferenz, iban, iban_maskiert, bic, kontoinhaber,
    bankname, status, unterschrieben_von, unterschrieben_am, unterschrift_ip, widerrufen_am,
    created_at
"#;

pub(crate) const HISTORY_COLUMNS: &str = r#"
    id, verbandsmitgliedschaft_id, aktion, beschreibung, alte_werte, neue_werte,
    durchgefuehrt_von, ip_adresse, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MembershipRow {
    id: i64,
    mitgliedsnummer: String,
    typ: String,
    status: String,
    dojo_id: Option<i64>,
    dojo_name: Option<String>,
    dojo_inhaber: Option<String>,
    person_vorname: Option<String>,
    person_nachname: Option<String>,
    person_geburtsdatum: Option<NaiveDate>,
    email: String,
    telefon: Option<String>,
    strasse: Option<String>,
    plz: Option<String>,
    ort: Option<String>,
    land: Option<String>,
    jahresbeitrag_cent: i64,
    beitragsfrei: bool,
    zahlungsart: String,
    sepa_iban: Option<String>,
    sepa_bic: Option<String>,
    sepa_kontoinhaber: Option<String>,
    gueltig_ab: NaiveDate,
    gueltig_bis: NaiveDate,
    agb_akzeptiert: bool,
    datenschutz_akzeptiert: bool,
    unterschrift_digital: Option<String>,
    unterschrift_datum: Option<DateTime<Utc>>,
    unterschrift_ip: Option<String>,
    notizen: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let party = match parse::<MembershipKind>("typ", &row.typ)? {
            MembershipKind::Dojo => Party::Dojo {
                dojo_id: row.dojo_id.map(DojoId::new),
                dojo_name: row.dojo_name.unwrap_or_default(),
                dojo_inhaber: row.dojo_inhaber,
            },
            MembershipKind::Einzelperson => Party::Einzelperson {
                vorname: row.person_vorname.unwrap_or_default(),
                nachname: row.person_nachname.unwrap_or_default(),
                geburtsdatum: row.person_geburtsdatum,
            },
        };

        let sepa = row.sepa_iban.map(|iban| SepaSnapshot {
            iban,
            bic: row.sepa_bic,
            kontoinhaber: row.sepa_kontoinhaber.unwrap_or_default(),
        });

        Ok(Membership {
            id: stored_id(MembershipId::new(row.id))?,
            mitgliedsnummer: MembershipNumber::from_stored(row.mitgliedsnummer),
            status: parse::<MembershipStatus>("status", &row.status)?,
            party,
            contact: Contact {
                email: row.email,
                telefon: row.telefon,
                strasse: row.strasse,
                plz: row.plz,
                ort: row.ort,
                land: row.land,
            },
            jahresbeitrag: Money::from_cents(row.jahresbeitrag_cent),
            beitragsfrei: row.beitragsfrei,
            zahlungsart: parse::<PaymentMethod>("zahlungsart", &row.zahlungsart)?,
            sepa,
            gueltig_ab: row.gueltig_ab,
            gueltig_bis: row.gueltig_bis,
            consent: Consent::new(row.agb_akzeptiert, row.datenschutz_akzeptiert),
            signature: Signature {
                unterschrift_digital: row.unterschrift_digital,
                unterschrift_datum: row.unterschrift_datum.map(Timestamp::from_datetime),
                unterschrift_ip: row.unterschrift_ip,
            },
            notizen: row.notizen,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PaymentRow {
    id: i64,
    verbandsmitgliedschaft_id: i64,
    rechnungsnummer: String,
    rechnungsdatum: NaiveDate,
    faellig_am: NaiveDate,
    betrag_netto_cent: i64,
    mwst_satz_bp: i32,
    mwst_betrag_cent: i64,
    betrag_brutto_cent: i64,
    zeitraum_von: NaiveDate,
    zeitraum_bis: NaiveDate,
    status: String,
    bezahlt_am: Option<DateTime<Utc>>,
    zahlungsart: Option<String>,
    transaktions_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let zahlungsart = row
            .zahlungsart
            .as_deref()
            .map(|s| parse::<PaymentMethod>("zahlungsart", s))
            .transpose()?;

        Ok(Payment {
            id: stored_id(PaymentId::new(row.id))?,
            verbandsmitgliedschaft_id: stored_id(MembershipId::new(row.verbandsmitgliedschaft_id))?,
            rechnungsnummer: InvoiceNumber::from_stored(row.rechnungsnummer),
            rechnungsdatum: row.rechnungsdatum,
            faellig_am: row.faellig_am,
            betrag_netto: Money::from_cents(row.betrag_netto_cent),
            mwst_satz: VatRate::from_basis_points(row.mwst_satz_bp.max(0) as u32),
            mwst_betrag: Money::from_cents(row.mwst_betrag_cent),
            betrag_brutto: Money::from_cents(row.betrag_brutto_cent),
            zeitraum_von: row.zeitraum_von,
            zeitraum_bis: row.zeitraum_bis,
            status: parse::<PaymentStatus>("status", &row.status)?,
            bezahlt_am: row.bezahlt_am.map(Timestamp::from_datetime),
            zahlungsart,
            transaktions_id: row.transaktions_id,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MandateRow {
    id: i64,
    verbandsmitgliedschaft_id: i64,
    mandatsreferenz: String,
    iban: String,
    iban_maskiert: String,
    bic: Option<String>,
    kontoinhaber: String,
    bankname: Option<String>,
    status: String,
    unterschrieben_von: Option<String>,
    unterschrieben_am: Option<DateTime<Utc>>,
    unterschrift_ip: Option<String>,
    widerrufen_am: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MandateRow> for SepaMandate {
    type Error = DomainError;

    fn try_from(row: MandateRow) -> Result<Self, Self::Error> {
        let iban = Iban::parse(&row.iban).map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid stored IBAN for mandate {}: {}", row.id, e),
            )
        })?;

        Ok(SepaMandate {
            id: stored_id(MandateId::new(row.id))?,
            verbandsmitgliedschaft_id: stored_id(MembershipId::new(row.verbandsmitgliedschaft_id))?,
            mandatsreferenz: MandateReference::from_stored(row.mandatsreferenz),
            iban,
            iban_maskiert: row.iban_maskiert,
            bic: row.bic,
            kontoinhaber: row.kontoinhaber,
            bankname: row.bankname,
            status: parse::<MandateStatus>("status", &row.status)?,
            signature: MandateSignature {
                unterschrieben_von: row.unterschrieben_von,
                unterschrieben_am: row.unterschrieben_am.map(Timestamp::from_datetime),
                unterschrift_ip: row.unterschrift_ip,
            },
            widerrufen_am: row.widerrufen_am.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HistoryRow {
    id: i64,
    verbandsmitgliedschaft_id: i64,
    aktion: String,
    beschreibung: String,
    alte_werte: Option<Value>,
    neue_werte: Option<Value>,
    durchgefuehrt_von: String,
    ip_adresse: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = DomainError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(HistoryEntry {
            id: stored_id(HistoryEntryId::new(row.id))?,
            verbandsmitgliedschaft_id: stored_id(MembershipId::new(row.verbandsmitgliedschaft_id))?,
            aktion: parse::<HistoryAction>("aktion", &row.aktion)?,
            beschreibung: row.beschreibung,
            alte_werte: row.alte_werte,
            neue_werte: row.neue_werte,
            durchgefuehrt_von: row.durchgefuehrt_von,
            ip_adresse: row.ip_adresse,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

/// Column values of a party, in table order.
pub(crate) struct PartyColumns<'a> {
    pub dojo_id: Option<i64>,
    pub dojo_name: Option<&'a str>,
    pub dojo_inhaber: Option<&'a str>,
    pub vorname: Option<&'a str>,
    pub nachname: Option<&'a str>,
    pub geburtsdatum: Option<NaiveDate>,
}

impl<'a> From<&'a Party> for PartyColumns<'a> {
    fn from(party: &'a Party) -> Self {
        match party {
            Party::Dojo {
                dojo_id,
                dojo_name,
                dojo_inhaber,
            } => Self {
                dojo_id: dojo_id.map(|d| d.value()),
                dojo_name: Some(dojo_name),
                dojo_inhaber: dojo_inhaber.as_deref(),
                vorname: None,
                nachname: None,
                geburtsdatum: None,
            },
            Party::Einzelperson {
                vorname,
                nachname,
                geburtsdatum,
            } => Self {
                dojo_id: None,
                dojo_name: None,
                dojo_inhaber: None,
                vorname: Some(vorname),
                nachname: Some(nachname),
                geburtsdatum: *geburtsdatum,
            },
        }
    }
}

/// Maps a failed write: unique violations become `Conflict`, the rest
/// `DatabaseError`.
pub(crate) fn write_error(context: &str, e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unique constraint").to_string();
            return DomainError::conflict(format!("{}: {} violated", context, constraint))
                .with_detail("constraint", constraint);
        }
    }
    DomainError::database(context, e)
}

pub(crate) fn read_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(context, e)
}

fn parse<T>(column: &str, value: &str) -> Result<T, DomainError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid {} value '{}': {}", column, value, e),
        )
    })
}

fn stored_id<T>(id: Result<T, crate::domain::foundation::ValidationError>) -> Result<T, DomainError> {
    id.map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Invalid stored id: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_values() {
        let err = parse::<MembershipStatus>("status", "frozen").unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(parse::<MembershipStatus>("status", "vertragsfrei").is_ok());
    }

    #[test]
    fn party_columns_are_exclusive() {
        let dojo = Party::Dojo {
            dojo_id: Some(DojoId::new(3)),
            dojo_name: "Dojo Nord".to_string(),
            dojo_inhaber: None,
        };
        let cols = PartyColumns::from(&dojo);
        assert_eq!(cols.dojo_id, Some(3));
        assert!(cols.vorname.is_none());

        let person = Party::Einzelperson {
            vorname: "Mia".to_string(),
            nachname: "Wolf".to_string(),
            geburtsdatum: None,
        };
        let cols = PartyColumns::from(&person);
        assert_eq!(cols.nachname, Some("Wolf"));
        assert!(cols.dojo_name.is_none());
    }
}
