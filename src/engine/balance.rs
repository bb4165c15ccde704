use chrono::NaiveDate;

use crate::Amount;
use crate::calendar::is_cycle_start;
use crate::config::BillingPolicy;
use crate::model::Invoice;

/// Outstanding amount after this invoice's payment is applied.
///
/// On the cycle start day (the 21st) the balance restarts from this cycle alone.
/// Any other day is a mid-cycle correction on top of `previous_balance`.
/// The result is not floored: a negative balance is a credit.
pub fn calculate_balance_amount(
    due_amount: Amount,
    arrear_amount: Amount,
    received_amount: Amount,
    invoice_date: NaiveDate,
    previous_balance: Amount,
    received_arrear_amount: Amount,
    policy: &BillingPolicy,
) -> Amount {
    let cycle = due_amount + arrear_amount - received_amount - received_arrear_amount;
    if is_cycle_start(invoice_date, policy) {
        cycle
    } else {
        previous_balance + cycle
    }
}

/// Balance carried into a new invoice, net of the charges this invoice bills again.
///
/// A first invoice issued off-cycle starts from the full due amount as the
/// pre-existing obligation. A follow-up inside the same due period bills the
/// period's due and arrear again, so the previous invoice's own charges come out
/// of its balance. An invoice opening a later period bills the unpaid balance as
/// `arrear_amount`, so only the remainder is carried.
pub fn previous_balance(
    previous: Option<&Invoice>,
    due_number: u32,
    due_amount: Amount,
    arrear_amount: Amount,
    invoice_date: NaiveDate,
    policy: &BillingPolicy,
) -> Amount {
    match previous {
        Some(invoice) if invoice.due_number == due_number => {
            invoice.balance_amount - invoice.due_amount - invoice.arrear_amount
        }
        Some(invoice) => invoice.balance_amount - arrear_amount,
        None if is_cycle_start(invoice_date, policy) => Amount::ZERO,
        None => due_amount,
    }
}
