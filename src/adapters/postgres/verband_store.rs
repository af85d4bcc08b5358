//! PostgreSQL implementation of the transactional VerbandStore.
//!
//! One [`PostgresVerbandTransaction`] wraps one `sqlx::Transaction`. Row
//! locks are taken with `SELECT ... FOR UPDATE`; counters are bumped with
//! `INSERT ... ON CONFLICT DO UPDATE ... RETURNING`, which serializes
//! concurrent callers on the counter row. Dropping the transaction without
//! committing rolls it back.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::foundation::{DomainError, ErrorCode, MandateId, MembershipId, PaymentId};
use crate::domain::membership::{
    HistoryEntry, Membership, MembershipKind, NewHistoryEntry, NewMandate, NewMembership,
    NewPayment, Payment, SepaMandate,
};
use crate::ports::{VerbandStore, VerbandTransaction};

use super::rows::{
    read_error, write_error, HistoryRow, MandateRow, MembershipRow, PartyColumns, PaymentRow,
    HISTORY_COLUMNS, MANDATE_COLUMNS, MEMBERSHIP_COLUMNS, PAYMENT_COLUMNS,
};

/// PostgreSQL implementation of the [`VerbandStore`] port.
pub struct PostgresVerbandStore {
    pool: PgPool,
}

impl PostgresVerbandStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerbandStore for PostgresVerbandStore {
    async fn begin(&self) -> Result<Box<dyn VerbandTransaction>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| read_error("Failed to begin transaction", e))?;
        Ok(Box::new(PostgresVerbandTransaction { tx }))
    }
}

pub struct PostgresVerbandTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl VerbandTransaction for PostgresVerbandTransaction {
    async fn next_membership_sequence(&mut self, kind: MembershipKind) -> Result<i64, DomainError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO verband_nummern_sequenz (typ, letzte_nummer)
            VALUES ($1, 1)
            ON CONFLICT (typ) DO UPDATE
                SET letzte_nummer = verband_nummern_sequenz.letzte_nummer + 1
            RETURNING letzte_nummer
            "#,
        )
        .bind(kind.sequence_key())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| write_error("Failed to draw membership number", e))
    }

    async fn next_invoice_sequence(&mut self, year: i32) -> Result<i64, DomainError> {
        // First use of a year seeds the counter from invoices already stored.
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO verband_rechnungsnummer_sequenz (jahr, letzte_nummer)
            VALUES (
                $1,
                (SELECT COUNT(*) FROM verbandsmitgliedschaft_zahlungen WHERE rechnungsnummer LIKE $2) + 1
            )
            ON CONFLICT (jahr) DO UPDATE
                SET letzte_nummer = verband_rechnungsnummer_sequenz.letzte_nummer + 1
            RETURNING letzte_nummer
            "#,
        )
        .bind(year)
        .bind(format!("{}/%", year))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| write_error("Failed to draw invoice number", e))
    }

    async fn insert_membership(&mut self, m: &NewMembership) -> Result<Membership, DomainError> {
        let party = PartyColumns::from(&m.party);
        let sql = format!(
            r#"
            INSERT INTO verbandsmitgliedschaften (
                mitgliedsnummer, typ, status,
                dojo_id, dojo_name, dojo_inhaber, person_vorname, person_nachname, person_geburtsdatum,
                email, telefon, strasse, plz, ort, land,
                jahresbeitrag_cent, beitragsfrei, zahlungsart, sepa_iban, sepa_bic, sepa_kontoinhaber,
                gueltig_ab, gueltig_bis, agb_akzeptiert, datenschutz_akzeptiert,
                unterschrift_digital, unterschrift_datum, unterschrift_ip, notizen
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29
            )
            RETURNING {}
            "#,
            MEMBERSHIP_COLUMNS
        );

        let row: MembershipRow = sqlx::query_as(&sql)
            .bind(m.mitgliedsnummer.as_str())
            .bind(m.party.kind().as_str())
            .bind(m.status.as_str())
            .bind(party.dojo_id)
            .bind(party.dojo_name)
            .bind(party.dojo_inhaber)
            .bind(party.vorname)
            .bind(party.nachname)
            .bind(party.geburtsdatum)
            .bind(&m.contact.email)
            .bind(&m.contact.telefon)
            .bind(&m.contact.strasse)
            .bind(&m.contact.plz)
            .bind(&m.contact.ort)
            .bind(&m.contact.land)
            .bind(m.jahresbeitrag.cents())
            .bind(m.beitragsfrei)
            .bind(m.zahlungsart.as_str())
            .bind(m.sepa.as_ref().map(|s| s.iban.as_str()))
            .bind(m.sepa.as_ref().and_then(|s| s.bic.as_deref()))
            .bind(m.sepa.as_ref().map(|s| s.kontoinhaber.as_str()))
            .bind(m.gueltig_ab)
            .bind(m.gueltig_bis)
            .bind(m.consent.agb_akzeptiert)
            .bind(m.consent.datenschutz_akzeptiert)
            .bind(&m.signature.unterschrift_digital)
            .bind(m.signature.unterschrift_datum.as_ref().map(|t| *t.as_datetime()))
            .bind(&m.signature.unterschrift_ip)
            .bind(&m.notizen)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| write_error("Failed to insert membership", e))?;

        row.try_into()
    }

    async fn lock_membership(&mut self, id: MembershipId) -> Result<Option<Membership>, DomainError> {
        let sql = format!(
            "SELECT {} FROM verbandsmitgliedschaften WHERE id = $1 FOR UPDATE",
            MEMBERSHIP_COLUMNS
        );
        let row: Option<MembershipRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| read_error("Failed to lock membership", e))?;

        row.map(Membership::try_from).transpose()
    }

    async fn update_membership(&mut self, m: &Membership) -> Result<(), DomainError> {
        let party = PartyColumns::from(&m.party);
        let result = sqlx::query(
            r#"
            UPDATE verbandsmitgliedschaften SET
                status = $2,
                dojo_id = $3, dojo_name = $4, dojo_inhaber = $5,
                person_vorname = $6, person_nachname = $7, person_geburtsdatum = $8,
                email = $9, telefon = $10, strasse = $11, plz = $12, ort = $13, land = $14,
                jahresbeitrag_cent = $15, beitragsfrei = $16, zahlungsart = $17,
                sepa_iban = $18, sepa_bic = $19, sepa_kontoinhaber = $20,
                gueltig_ab = $21, gueltig_bis = $22,
                agb_akzeptiert = $23, datenschutz_akzeptiert = $24,
                unterschrift_digital = $25, unterschrift_datum = $26, unterschrift_ip = $27,
                notizen = $28,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(m.id.value())
        .bind(m.status.as_str())
        .bind(party.dojo_id)
        .bind(party.dojo_name)
        .bind(party.dojo_inhaber)
        .bind(party.vorname)
        .bind(party.nachname)
        .bind(party.geburtsdatum)
        .bind(&m.contact.email)
        .bind(&m.contact.telefon)
        .bind(&m.contact.strasse)
        .bind(&m.contact.plz)
        .bind(&m.contact.ort)
        .bind(&m.contact.land)
        .bind(m.jahresbeitrag.cents())
        .bind(m.beitragsfrei)
        .bind(m.zahlungsart.as_str())
        .bind(m.sepa.as_ref().map(|s| s.iban.as_str()))
        .bind(m.sepa.as_ref().and_then(|s| s.bic.as_deref()))
        .bind(m.sepa.as_ref().map(|s| s.kontoinhaber.as_str()))
        .bind(m.gueltig_ab)
        .bind(m.gueltig_bis)
        .bind(m.consent.agb_akzeptiert)
        .bind(m.consent.datenschutz_akzeptiert)
        .bind(&m.signature.unterschrift_digital)
        .bind(m.signature.unterschrift_datum.as_ref().map(|t| *t.as_datetime()))
        .bind(&m.signature.unterschrift_ip)
        .bind(&m.notizen)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| write_error("Failed to update membership", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(ErrorCode::MembershipNotFound, "Membership not found")
                .with_detail("id", m.id.to_string()));
        }
        Ok(())
    }

    async fn insert_payment(&mut self, p: &NewPayment) -> Result<Payment, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO verbandsmitgliedschaft_zahlungen (
                verbandsmitgliedschaft_id, rechnungsnummer, rechnungsdatum, faellig_am,
                betrag_netto_cent, mwst_satz_bp, mwst_betrag_cent, betrag_brutto_cent,
                zeitraum_von, zeitraum_bis, status, zahlungsart
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'offen', $11)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        let row: PaymentRow = sqlx::query_as(&sql)
            .bind(p.membership_id.value())
            .bind(p.rechnungsnummer.as_str())
            .bind(p.rechnungsdatum)
            .bind(p.faellig_am)
            .bind(p.billing.betrag_netto.cents())
            .bind(p.billing.mwst_satz.basis_points() as i32)
            .bind(p.billing.mwst_betrag.cents())
            .bind(p.billing.betrag_brutto.cents())
            .bind(p.zeitraum_von)
            .bind(p.zeitraum_bis)
            .bind(p.zahlungsart.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| write_error("Failed to insert payment", e))?;

        row.try_into()
    }

    async fn payment_owner(&mut self, id: PaymentId) -> Result<Option<MembershipId>, DomainError> {
        let owner: Option<i64> = sqlx::query_scalar(
            "SELECT verbandsmitgliedschaft_id FROM verbandsmitgliedschaft_zahlungen WHERE id = $1",
        )
        .bind(id.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| read_error("Failed to find payment", e))?;

        owner.map(MembershipId::new).transpose().map_err(DomainError::from)
    }

    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM verbandsmitgliedschaft_zahlungen WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| read_error("Failed to lock payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn update_payment(&mut self, p: &Payment) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE verbandsmitgliedschaft_zahlungen SET
                status = $2,
                bezahlt_am = $3,
                zahlungsart = $4,
                transaktions_id = $5
            WHERE id = $1
            "#,
        )
        .bind(p.id.value())
        .bind(p.status.as_str())
        .bind(p.bezahlt_am.as_ref().map(|t| *t.as_datetime()))
        .bind(p.zahlungsart.as_ref().map(|z| z.as_str()))
        .bind(&p.transaktions_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| write_error("Failed to update payment", e))?;

        Ok(())
    }

    async fn open_payments(&mut self, membership_id: MembershipId) -> Result<Vec<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM verbandsmitgliedschaft_zahlungen
            WHERE verbandsmitgliedschaft_id = $1 AND status = 'offen'
            ORDER BY id
            FOR UPDATE
            "#,
            PAYMENT_COLUMNS
        );
        let rows: Vec<PaymentRow> = sqlx::query_as(&sql)
            .bind(membership_id.value())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| read_error("Failed to lock open payments", e))?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn insert_mandate(&mut self, m: &NewMandate) -> Result<SepaMandate, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO verband_sepa_mandate (
                verbandsmitgliedschaft_id, mandatsreferenz, iban, iban_maskiert, bic,
                kontoinhaber, bankname, status, unterschrieben_von, unterschrieben_am,
                unterschrift_ip
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'aktiv', $8, $9, $10)
            RETURNING {}
            "#,
            MANDATE_COLUMNS
        );

        let row: MandateRow = sqlx::query_as(&sql)
            .bind(m.membership_id.value())
            .bind(m.mandatsreferenz.as_str())
            .bind(m.iban.as_str())
            .bind(m.iban.masked())
            .bind(&m.bic)
            .bind(&m.kontoinhaber)
            .bind(&m.bankname)
            .bind(&m.signature.unterschrieben_von)
            .bind(m.signature.unterschrieben_am.as_ref().map(|t| *t.as_datetime()))
            .bind(&m.signature.unterschrift_ip)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| write_error("Failed to insert SEPA mandate", e))?;

        row.try_into()
    }

    async fn mandate_owner(&mut self, id: MandateId) -> Result<Option<MembershipId>, DomainError> {
        let owner: Option<i64> =
            sqlx::query_scalar("SELECT verbandsmitgliedschaft_id FROM verband_sepa_mandate WHERE id = $1")
                .bind(id.value())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| read_error("Failed to find SEPA mandate", e))?;

        owner.map(MembershipId::new).transpose().map_err(DomainError::from)
    }

    async fn lock_mandate(&mut self, id: MandateId) -> Result<Option<SepaMandate>, DomainError> {
        let sql = format!(
            "SELECT {} FROM verband_sepa_mandate WHERE id = $1 FOR UPDATE",
            MANDATE_COLUMNS
        );
        let row: Option<MandateRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| read_error("Failed to lock SEPA mandate", e))?;

        row.map(SepaMandate::try_from).transpose()
    }

    async fn active_mandates(&mut self, membership_id: MembershipId) -> Result<Vec<SepaMandate>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM verband_sepa_mandate
            WHERE verbandsmitgliedschaft_id = $1 AND status = 'aktiv'
            ORDER BY id
            FOR UPDATE
            "#,
            MANDATE_COLUMNS
        );
        let rows: Vec<MandateRow> = sqlx::query_as(&sql)
            .bind(membership_id.value())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| read_error("Failed to lock active SEPA mandates", e))?;

        rows.into_iter().map(SepaMandate::try_from).collect()
    }

    async fn update_mandate(&mut self, m: &SepaMandate) -> Result<(), DomainError> {
        sqlx::query("UPDATE verband_sepa_mandate SET status = $2, widerrufen_am = $3 WHERE id = $1")
            .bind(m.id.value())
            .bind(m.status.as_str())
            .bind(m.widerrufen_am.as_ref().map(|t| *t.as_datetime()))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_error("Failed to update SEPA mandate", e))?;

        Ok(())
    }

    async fn append_history(&mut self, entry: &NewHistoryEntry) -> Result<HistoryEntry, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO verbandsmitgliedschaft_historie (
                verbandsmitgliedschaft_id, aktion, beschreibung, alte_werte, neue_werte,
                durchgefuehrt_von, ip_adresse
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            HISTORY_COLUMNS
        );

        let row: HistoryRow = sqlx::query_as(&sql)
            .bind(entry.membership_id.value())
            .bind(entry.aktion.as_str())
            .bind(&entry.beschreibung)
            .bind(&entry.alte_werte)
            .bind(&entry.neue_werte)
            .bind(&entry.durchgefuehrt_von)
            .bind(&entry.ip_adresse)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| write_error("Failed to append history entry", e))?;

        row.try_into()
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| write_error("Failed to commit transaction", e))
    }
}
