use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::Amount;
use crate::model::{Enrollment, EnrollmentId};
use crate::store::{InvoiceLookup, StoreError};

/// Arrear to carry into a new invoice, read from the enrollment's cached snapshot.
///
/// A missing snapshot means the member was never in arrears. The previous invoice is
/// only consulted to report drift between the snapshot and that invoice's unpaid
/// remainder; the snapshot always wins.
pub fn calculate_arrear_amount(
    enrollment_id: EnrollmentId,
    invoices: &impl InvoiceLookup,
    invoice_date: NaiveDate,
    enrollment: &Enrollment,
) -> Result<Amount, StoreError> {
    let cached = enrollment.current_arrear.unwrap_or(Amount::ZERO);

    if let Some(previous) = invoices.previous_invoice(enrollment_id, invoice_date)? {
        let unpaid = previous.balance_amount.non_negative();
        if unpaid != cached {
            warn!(
                enrollment = enrollment_id,
                cached = %cached,
                unpaid = %unpaid,
                previous = %previous.invoice_number,
                "cached arrear disagrees with previous invoice"
            );
        }
    }

    debug!(
        enrollment = enrollment_id,
        arrear = %cached,
        last_updated = ?enrollment.arrear_last_updated,
        "arrear from enrollment snapshot"
    );
    Ok(cached)
}
