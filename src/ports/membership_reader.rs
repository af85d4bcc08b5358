//! Membership reader port (read side).
//!
//! Queries for lists, detail pages and the per-membership collections.
//! Reads never lock and never run inside a lifecycle transaction.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, MembershipId, ValidationError};
use crate::domain::membership::{
    HistoryEntry, Membership, MembershipKind, MembershipStatus, Payment, SepaMandate,
};

/// List filter for memberships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipFilter {
    pub typ: Option<MembershipKind>,
    pub status: Option<MembershipStatus>,
    pub limit: u32,
}

impl MembershipFilter {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 500;

    /// Builds a filter; `limit` defaults to 100 and is capped at 500.
    pub fn new(
        typ: Option<MembershipKind>,
        status: Option<MembershipStatus>,
        limit: Option<u32>,
    ) -> Result<Self, ValidationError> {
        let limit = match limit {
            None => Self::DEFAULT_LIMIT,
            Some(0) => {
                return Err(ValidationError::out_of_range("limit", 1, Self::MAX_LIMIT as i64, 0))
            }
            Some(n) => n.min(Self::MAX_LIMIT),
        };
        Ok(Self { typ, status, limit })
    }
}

impl Default for MembershipFilter {
    fn default() -> Self {
        Self {
            typ: None,
            status: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Read-only access to memberships and their records.
#[async_trait]
pub trait MembershipReader: Send + Sync {
    /// Memberships matching the filter, newest first.
    async fn list(&self, filter: &MembershipFilter) -> Result<Vec<Membership>, DomainError>;

    /// A single membership. Returns `None` if not found.
    async fn get(&self, id: MembershipId) -> Result<Option<Membership>, DomainError>;

    /// Payments of a membership, latest billing period first.
    async fn payments(&self, id: MembershipId) -> Result<Vec<Payment>, DomainError>;

    /// Mandates of a membership (active and revoked), newest first.
    async fn mandates(&self, id: MembershipId) -> Result<Vec<SepaMandate>, DomainError>;

    /// Audit trail of a membership, newest first.
    async fn history(&self, id: MembershipId) -> Result<Vec<HistoryEntry>, DomainError>;
}
