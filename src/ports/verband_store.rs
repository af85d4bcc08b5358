//! Transactional store port (write side).
//!
//! Every lifecycle operation runs inside one [`VerbandTransaction`]: it locks
//! the membership row, reads and writes payments, mandates and history, and
//! either commits everything or nothing.
//!
//! # Design
//!
//! - **Unit of work**: one transaction object spans all tables
//! - **Row locks**: `lock_*` methods hold the row until commit or drop
//! - **Rollback on drop**: a transaction that is not committed leaves no trace
//! - **Append-only history**: there is no update or delete for history entries
//!
//! # Example
//!
//! ```ignore
//! let mut tx = store.begin().await?;
//! let mut membership = tx
//!     .lock_membership(id)
//!     .await?
//!     .ok_or_else(|| MembershipError::not_found(id))?;
//! membership.cancel()?;
//! tx.update_membership(&membership).await?;
//! tx.append_history(&entry).await?;
//! tx.commit().await?;
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, MandateId, MembershipId, PaymentId};
use crate::domain::membership::{
    HistoryEntry, Membership, MembershipKind, NewHistoryEntry, NewMandate, NewMembership,
    NewPayment, Payment, SepaMandate,
};

/// Opens store transactions.
#[async_trait]
pub trait VerbandStore: Send + Sync {
    /// Begins a new transaction.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` if no connection is available
    async fn begin(&self) -> Result<Box<dyn VerbandTransaction>, DomainError>;
}

/// One open store transaction.
#[async_trait]
pub trait VerbandTransaction: Send {
    /// Atomically increments the membership number counter for `kind` and
    /// returns the new value (1 for the first membership of that kind).
    async fn next_membership_sequence(&mut self, kind: MembershipKind) -> Result<i64, DomainError>;

    /// Atomically increments the invoice counter for `year` and returns the
    /// new value. The counter is seeded from invoices already stored for
    /// that year on first use.
    async fn next_invoice_sequence(&mut self, year: i32) -> Result<i64, DomainError>;

    /// Inserts a membership and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the membership number already exists
    async fn insert_membership(&mut self, membership: &NewMembership) -> Result<Membership, DomainError>;

    /// Loads a membership and locks its row until the transaction ends.
    async fn lock_membership(&mut self, id: MembershipId) -> Result<Option<Membership>, DomainError>;

    /// Writes back a locked membership.
    async fn update_membership(&mut self, membership: &Membership) -> Result<(), DomainError>;

    /// Inserts a payment.
    ///
    /// # Errors
    ///
    /// - `Conflict` on a duplicate invoice number or a second non-voided
    ///   payment for the same billing period start
    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<Payment, DomainError>;

    /// Owning membership of a payment, without locking.
    async fn payment_owner(&mut self, id: PaymentId) -> Result<Option<MembershipId>, DomainError>;

    /// Loads a payment and locks its row.
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, DomainError>;

    /// Writes back a locked payment.
    async fn update_payment(&mut self, payment: &Payment) -> Result<(), DomainError>;

    /// Locks and returns all `offen` payments of a membership.
    async fn open_payments(&mut self, membership_id: MembershipId) -> Result<Vec<Payment>, DomainError>;

    /// Inserts an active mandate.
    ///
    /// # Errors
    ///
    /// - `Conflict` on a duplicate reference or a second active mandate
    async fn insert_mandate(&mut self, mandate: &NewMandate) -> Result<SepaMandate, DomainError>;

    /// Owning membership of a mandate, without locking.
    async fn mandate_owner(&mut self, id: MandateId) -> Result<Option<MembershipId>, DomainError>;

    /// Loads a mandate and locks its row.
    async fn lock_mandate(&mut self, id: MandateId) -> Result<Option<SepaMandate>, DomainError>;

    /// Locks and returns the active mandates of a membership.
    async fn active_mandates(&mut self, membership_id: MembershipId) -> Result<Vec<SepaMandate>, DomainError>;

    /// Writes back a locked mandate.
    async fn update_mandate(&mut self, mandate: &SepaMandate) -> Result<(), DomainError>;

    /// Appends a history entry.
    async fn append_history(&mut self, entry: &NewHistoryEntry) -> Result<HistoryEntry, DomainError>;

    /// Commits the transaction.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
