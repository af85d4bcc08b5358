//! IssueInvoiceNumberHandler - Draws an invoice number without a payment.
//!
//! For invoices created outside the lifecycle operations (manual invoices,
//! corrections), served at `POST /rechnungsnummern`. Shares the per-year
//! counter with every other invoice source, so numbers never collide.

use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

use crate::domain::membership::{InvoiceNumber, MembershipError};
use crate::ports::VerbandStore;

use super::common::today;

#[derive(Debug, Clone, Default)]
pub struct IssueInvoiceNumberCommand {
    /// Invoice date; defaults to today.
    pub datum: Option<NaiveDate>,
}

pub struct IssueInvoiceNumberHandler {
    store: Arc<dyn VerbandStore>,
}

impl IssueInvoiceNumberHandler {
    pub fn new(store: Arc<dyn VerbandStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, cmd: IssueInvoiceNumberCommand) -> Result<InvoiceNumber, MembershipError> {
        let date = cmd.datum.unwrap_or_else(today);
        let mut tx = self.store.begin().await?;
        let issued = tx.next_invoice_sequence(date.year()).await?;
        let number = InvoiceNumber::format(date, issued)?;
        tx.commit().await?;

        tracing::debug!(rechnungsnummer = %number, "Invoice number issued");
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::membership::test_support::Fixture;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn numbers_start_at_base_each_year() {
        let fx = Fixture::new();
        let handler = IssueInvoiceNumberHandler::new(fx.store.clone());

        let a = handler
            .handle(IssueInvoiceNumberCommand { datum: Some(date(2031, 3, 9)) })
            .await
            .unwrap();
        let b = handler
            .handle(IssueInvoiceNumberCommand { datum: Some(date(2031, 3, 9)) })
            .await
            .unwrap();
        let c = handler
            .handle(IssueInvoiceNumberCommand { datum: Some(date(2032, 1, 2)) })
            .await
            .unwrap();

        assert_eq!(a.as_str(), "2031/03/09-1000");
        assert_eq!(b.as_str(), "2031/03/09-1001");
        assert_eq!(c.as_str(), "2032/01/02-1000");
    }

    #[tokio::test]
    async fn shares_the_counter_with_registrations() {
        let fx = Fixture::new();
        let m = fx.register_dojo().await;
        let handler = IssueInvoiceNumberHandler::new(fx.store.clone());

        let number = handler
            .handle(IssueInvoiceNumberCommand { datum: Some(m.gueltig_ab) })
            .await
            .unwrap();
        assert!(number.as_str().ends_with("-1001"));
    }
}
