//! PostgreSQL settings store (`verband_einstellungen`).
//!
//! Values are stored as text and parsed with the row's declared type.
//! A row that fails to parse is skipped by the resolver with a warning, so
//! the built-in default applies instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::membership::{Setting, SettingType, SettingValue};
use crate::ports::{SettingsRepository, SettingsResolver};

use super::rows::{read_error, write_error};

pub struct PostgresSettings {
    pool: PgPool,
}

impl PostgresSettings {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn rows(&self) -> Result<Vec<SettingRow>, DomainError> {
        sqlx::query_as(
            r#"
            SELECT schluessel, wert, typ, beschreibung, updated_at
            FROM verband_einstellungen
            ORDER BY schluessel
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_error("Failed to read settings", e))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SettingRow {
    schluessel: String,
    wert: String,
    typ: String,
    beschreibung: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettingRow> for Setting {
    type Error = DomainError;

    fn try_from(row: SettingRow) -> Result<Self, Self::Error> {
        let invalid = |e: String| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid stored setting '{}': {}", row.schluessel, e),
            )
        };
        let typ = row
            .typ
            .parse::<SettingType>()
            .map_err(|e| invalid(e.to_string()))?;
        let wert = SettingValue::parse_stored(typ, &row.wert).map_err(|e| invalid(e.to_string()))?;

        Ok(Setting {
            schluessel: row.schluessel,
            wert,
            beschreibung: row.beschreibung,
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl SettingsResolver for PostgresSettings {
    async fn get(&self, key: &str) -> Result<Option<SettingValue>, DomainError> {
        let row: Option<SettingRow> = sqlx::query_as(
            r#"
            SELECT schluessel, wert, typ, beschreibung, updated_at
            FROM verband_einstellungen
            WHERE schluessel = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error("Failed to read setting", e))?;

        Ok(row.and_then(|row| match Setting::try_from(row) {
            Ok(setting) => Some(setting.wert),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Ignoring unreadable setting");
                None
            }
        }))
    }

    async fn all(&self) -> Result<HashMap<String, SettingValue>, DomainError> {
        let mut values = HashMap::new();
        for row in self.rows().await? {
            match Setting::try_from(row) {
                Ok(setting) => {
                    values.insert(setting.schluessel, setting.wert);
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring unreadable setting"),
            }
        }
        Ok(values)
    }
}

#[async_trait]
impl SettingsRepository for PostgresSettings {
    async fn list(&self) -> Result<Vec<Setting>, DomainError> {
        self.rows().await?.into_iter().map(Setting::try_from).collect()
    }

    async fn find(&self, key: &str) -> Result<Option<Setting>, DomainError> {
        let row: Option<SettingRow> = sqlx::query_as(
            r#"
            SELECT schluessel, wert, typ, beschreibung, updated_at
            FROM verband_einstellungen
            WHERE schluessel = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error("Failed to read setting", e))?;

        row.map(Setting::try_from).transpose()
    }

    async fn save_values(&self, values: &[(String, SettingValue)]) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| read_error("Failed to begin transaction", e))?;

        for (key, value) in values {
            let result = sqlx::query(
                r#"
                UPDATE verband_einstellungen
                SET wert = $2, typ = $3, updated_at = NOW()
                WHERE schluessel = $1
                "#,
            )
            .bind(key)
            .bind(value.to_stored())
            .bind(value.typ().as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error("Failed to save setting", e))?;

            if result.rows_affected() == 0 {
                return Err(DomainError::new(ErrorCode::SettingNotFound, "Setting not found")
                    .with_detail("key", key.clone()));
            }
        }

        tx.commit()
            .await
            .map_err(|e| write_error("Failed to commit settings", e))
    }
}
