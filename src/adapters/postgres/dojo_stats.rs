//! Dojo usage statistics from the platform tables.
//!
//! Reads `dojo`, `mitglieder` and `checkins`, which belong to the dojo
//! management platform and are not part of this service's migrations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DojoId, DomainError, Timestamp};
use crate::ports::{DojoStats, DojoStatsProvider};

use super::rows::read_error;

pub struct PostgresDojoStats {
    pool: PgPool,
}

impl PostgresDojoStats {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DojoStatsRow {
    aktive_mitglieder: i64,
    mitglieder_gesamt: i64,
    letzter_checkin: Option<DateTime<Utc>>,
}

#[async_trait]
impl DojoStatsProvider for PostgresDojoStats {
    async fn stats(&self, dojo_id: DojoId) -> Result<Option<DojoStats>, DomainError> {
        let row: Option<DojoStatsRow> = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM mitglieder m WHERE m.dojo_id = d.id AND m.aktiv) AS aktive_mitglieder,
                (SELECT COUNT(*) FROM mitglieder m WHERE m.dojo_id = d.id) AS mitglieder_gesamt,
                (SELECT MAX(c.checkin_zeit)
                   FROM checkins c
                   JOIN mitglieder m ON m.mitglied_id = c.mitglied_id
                  WHERE m.dojo_id = d.id) AS letzter_checkin
            FROM dojo d
            WHERE d.id = $1
            "#,
        )
        .bind(dojo_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error("Failed to load dojo statistics", e))?;

        Ok(row.map(|r| DojoStats {
            aktive_mitglieder: r.aktive_mitglieder,
            mitglieder_gesamt: r.mitglieder_gesamt,
            letzter_checkin: r.letzter_checkin.map(Timestamp::from_datetime),
        }))
    }
}
