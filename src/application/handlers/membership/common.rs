//! Steps shared by the lifecycle handlers.

use chrono::{Datelike, Duration, NaiveDate};

use crate::domain::foundation::{MembershipId, Timestamp};
use crate::domain::membership::{
    compute_brutto, BillingPeriod, InvoiceNumber, Membership, MembershipError, NewPayment, Payment,
    VerbandSettings,
};
use crate::ports::VerbandTransaction;

/// Business date used for validity periods and invoice dates.
pub(crate) fn today() -> NaiveDate {
    Timestamp::now().date()
}

/// Loads and locks a membership or fails with `NotFound`.
pub(crate) async fn lock_membership(
    tx: &mut dyn VerbandTransaction,
    id: MembershipId,
) -> Result<Membership, MembershipError> {
    tx.lock_membership(id)
        .await?
        .ok_or_else(|| MembershipError::not_found(id))
}

/// Issues an open invoice for `period` at the membership's current fee.
///
/// The invoice number is drawn from the same transaction, so a rollback
/// also returns the number.
pub(crate) async fn issue_invoice(
    tx: &mut dyn VerbandTransaction,
    membership: &Membership,
    period: BillingPeriod,
    settings: &VerbandSettings,
    today: NaiveDate,
) -> Result<Payment, MembershipError> {
    let issued = tx.next_invoice_sequence(today.year()).await?;
    let payment = NewPayment {
        membership_id: membership.id,
        rechnungsnummer: InvoiceNumber::format(today, issued)?,
        rechnungsdatum: today,
        faellig_am: today + Duration::days(i64::from(settings.zahlungsziel_tage)),
        billing: compute_brutto(membership.jahresbeitrag, settings.mwst_satz)?,
        zeitraum_von: period.start,
        zeitraum_bis: period.end,
        zahlungsart: membership.zahlungsart,
    };
    payment.validate()?;
    Ok(tx.insert_payment(&payment).await?)
}

/// Adds the fields of `extra` to a JSON object snapshot.
pub(crate) fn with_fields(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    if let (Some(target), serde_json::Value::Object(source)) = (base.as_object_mut(), extra) {
        target.extend(source);
    }
    base
}
