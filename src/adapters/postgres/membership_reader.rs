//! PostgreSQL implementation of MembershipReader.
//!
//! Plain pool queries without locks; callers never mix these with an open
//! store transaction.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, MembershipId};
use crate::domain::membership::{HistoryEntry, Membership, Payment, SepaMandate};
use crate::ports::{MembershipFilter, MembershipReader};

use super::rows::{
    read_error, HistoryRow, MandateRow, MembershipRow, PaymentRow, HISTORY_COLUMNS,
    MANDATE_COLUMNS, MEMBERSHIP_COLUMNS, PAYMENT_COLUMNS,
};

/// PostgreSQL implementation of the MembershipReader port.
pub struct PostgresMembershipReader {
    pool: PgPool,
}

impl PostgresMembershipReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipReader for PostgresMembershipReader {
    async fn list(&self, filter: &MembershipFilter) -> Result<Vec<Membership>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM verbandsmitgliedschaften
            WHERE ($1::text IS NULL OR typ = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
            MEMBERSHIP_COLUMNS
        );
        let rows: Vec<MembershipRow> = sqlx::query_as(&sql)
            .bind(filter.typ.map(|t| t.as_str()))
            .bind(filter.status.map(|s| s.as_str()))
            .bind(i64::from(filter.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error("Failed to list memberships", e))?;

        rows.into_iter().map(Membership::try_from).collect()
    }

    async fn get(&self, id: MembershipId) -> Result<Option<Membership>, DomainError> {
        let sql = format!(
            "SELECT {} FROM verbandsmitgliedschaften WHERE id = $1",
            MEMBERSHIP_COLUMNS
        );
        let row: Option<MembershipRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_error("Failed to find membership", e))?;

        row.map(Membership::try_from).transpose()
    }

    async fn payments(&self, id: MembershipId) -> Result<Vec<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM verbandsmitgliedschaft_zahlungen
            WHERE verbandsmitgliedschaft_id = $1
            ORDER BY zeitraum_von DESC, id DESC
            "#,
            PAYMENT_COLUMNS
        );
        let rows: Vec<PaymentRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error("Failed to list payments", e))?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn mandates(&self, id: MembershipId) -> Result<Vec<SepaMandate>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM verband_sepa_mandate
            WHERE verbandsmitgliedschaft_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
            MANDATE_COLUMNS
        );
        let rows: Vec<MandateRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error("Failed to list SEPA mandates", e))?;

        rows.into_iter().map(SepaMandate::try_from).collect()
    }

    async fn history(&self, id: MembershipId) -> Result<Vec<HistoryEntry>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM verbandsmitgliedschaft_historie
            WHERE verbandsmitgliedschaft_id = $1
            ORDER BY id DESC
            "#,
            HISTORY_COLUMNS
        );
        let rows: Vec<HistoryRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error("Failed to load history", e))?;

        rows.into_iter().map(HistoryEntry::try_from).collect()
    }
}
