//! Usage statistics of a linked dojo, shown on the membership detail page.
//!
//! The numbers come from the platform's member and check-in tables, which
//! this service only reads.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::foundation::{DojoId, DomainError, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DojoStats {
    pub aktive_mitglieder: i64,
    pub mitglieder_gesamt: i64,
    pub letzter_checkin: Option<Timestamp>,
}

#[async_trait]
pub trait DojoStatsProvider: Send + Sync {
    /// Statistics for a dojo. Returns `None` if the dojo is unknown.
    async fn stats(&self, dojo_id: DojoId) -> Result<Option<DojoStats>, DomainError>;
}
