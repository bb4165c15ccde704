use chrono::NaiveDate;

use crate::calendar::{is_past_cut_off, months_between};
use crate::config::BillingPolicy;
use crate::model::PlanId;

use super::ValidationError;

/// Compute the 1-based installment an invoice dated `invoice_date` bills against.
///
/// An invoice dated on or before the cut-off day bills against the period ending in
/// its month; after the cut-off it rolls into the next due. Everything up to the
/// first cut-off after the start month is due 1.
///
/// Fails instead of clamping when the plan has no installment left for that date.
pub fn calculate_due_number(
    plan: PlanId,
    start_date: NaiveDate,
    invoice_date: NaiveDate,
    duration: u32,
    policy: &BillingPolicy,
) -> Result<u32, ValidationError> {
    if duration == 0 {
        return Err(ValidationError::InvalidDuration(plan));
    }
    if invoice_date < start_date {
        return Err(ValidationError::InvoiceBeforeStart {
            start_date,
            invoice_date,
        });
    }

    let mut elapsed = months_between(start_date, invoice_date);
    if is_past_cut_off(invoice_date, policy) {
        elapsed += 1;
    }
    // invoice_date >= start_date, so elapsed >= 0
    let due_number = elapsed.max(1) as u32;

    if due_number > duration {
        return Err(ValidationError::DueNumberExceedsDuration {
            due_number,
            duration,
        });
    }
    Ok(due_number)
}
