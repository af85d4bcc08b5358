//! Query handlers for the per-membership collections.
//!
//! Unknown membership ids yield empty lists, matching the list endpoints.

use std::sync::Arc;

use crate::domain::foundation::MembershipId;
use crate::domain::membership::{HistoryEntry, MembershipError, Payment, SepaMandate};
use crate::ports::MembershipReader;

#[derive(Debug, Clone, Copy)]
pub struct MembershipRecordsQuery {
    pub membership_id: MembershipId,
}

/// Payments, mandates and audit trail of one membership.
pub struct MembershipRecordsHandler {
    reader: Arc<dyn MembershipReader>,
}

impl MembershipRecordsHandler {
    pub fn new(reader: Arc<dyn MembershipReader>) -> Self {
        Self { reader }
    }

    /// Latest billing period first.
    pub async fn payments(&self, query: MembershipRecordsQuery) -> Result<Vec<Payment>, MembershipError> {
        Ok(self.reader.payments(query.membership_id).await?)
    }

    /// Active and revoked, newest first.
    pub async fn mandates(&self, query: MembershipRecordsQuery) -> Result<Vec<SepaMandate>, MembershipError> {
        Ok(self.reader.mandates(query.membership_id).await?)
    }

    /// Newest first.
    pub async fn history(&self, query: MembershipRecordsQuery) -> Result<Vec<HistoryEntry>, MembershipError> {
        Ok(self.reader.history(query.membership_id).await?)
    }
}
