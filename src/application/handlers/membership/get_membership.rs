//! GetMembershipHandler - Query handler for the membership detail view.
//!
//! Returns the membership with its audit trail and, for dojos linked to a
//! platform dojo, the dojo's usage statistics.

use std::sync::Arc;

use crate::domain::foundation::MembershipId;
use crate::domain::membership::{HistoryEntry, Membership, MembershipError};
use crate::ports::{DojoStats, DojoStatsProvider, MembershipReader};

/// Query to get a membership.
#[derive(Debug, Clone)]
pub struct GetMembershipQuery {
    pub membership_id: MembershipId,
}

/// Membership detail view.
#[derive(Debug, Clone)]
pub struct GetMembershipResult {
    pub membership: Membership,
    /// Newest first.
    pub history: Vec<HistoryEntry>,
    pub dojo_stats: Option<DojoStats>,
}

/// Handler for getting membership details.
pub struct GetMembershipHandler {
    reader: Arc<dyn MembershipReader>,
    dojo_stats: Arc<dyn DojoStatsProvider>,
}

impl GetMembershipHandler {
    pub fn new(reader: Arc<dyn MembershipReader>, dojo_stats: Arc<dyn DojoStatsProvider>) -> Self {
        Self { reader, dojo_stats }
    }

    pub async fn handle(&self, query: GetMembershipQuery) -> Result<GetMembershipResult, MembershipError> {
        let membership = self
            .reader
            .get(query.membership_id)
            .await?
            .ok_or_else(|| MembershipError::not_found(query.membership_id))?;
        let history = self.reader.history(membership.id).await?;

        // Statistics are decoration; a failing lookup must not hide the membership.
        let dojo_stats = match membership.party.dojo_id() {
            Some(dojo_id) => match self.dojo_stats.stats(dojo_id).await {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::warn!(dojo_id = %dojo_id, error = %e, "Failed to load dojo statistics");
                    None
                }
            },
            None => None,
        };

        Ok(GetMembershipResult {
            membership,
            history,
            dojo_stats,
        })
    }
}
