//! Calendar helpers for billing periods.

use chrono::{Datelike, NaiveDate};

use crate::config::BillingPolicy;

/// Whole calendar months from `from` to `to`, ignoring the day of month.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

/// Whether `date` falls after the cut-off and therefore bills against the next period.
pub fn is_past_cut_off(date: NaiveDate, policy: &BillingPolicy) -> bool {
    date.day() > policy.cut_off_day()
}

/// Whether `date` is the first day of a new billing cycle (the 21st by default).
pub fn is_cycle_start(date: NaiveDate, policy: &BillingPolicy) -> bool {
    date.day() == policy.cycle_start_day()
}

/// Display month for receipts, e.g. "January 2025".
pub fn format_payment_month(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}
