//! Core domain types for the billing engine.

use std::fmt;

use chrono::NaiveDate;

use crate::Amount;

/// Member (customer) identifier.
pub type UserId = u32;

/// Plan identifier.
pub type PlanId = u32;

/// Enrollment identifier.
pub type EnrollmentId = u32;

/// Staff identifier.
pub type StaffId = u32;

/// One row of a plan's monthly schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyEntry {
    pub month_number: u32,
    /// The "Due" column: what the member is billed for this month.
    pub installment_amount: Option<Amount>,
    pub dividend: Option<Amount>,
    /// Installment net of dividend.
    pub payable_amount: Option<Amount>,
}

/// A chit-fund product definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    /// Number of installments (months).
    pub duration: u32,
    pub total_amount: Amount,
    /// Denormalized `payable_amount` per month, index 0 = month 1.
    pub monthly_amount: Vec<Amount>,
    /// Authoritative monthly schedule.
    pub monthly_data: Vec<MonthlyEntry>,
}

/// One member's subscription to one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub member_number: u32,
    /// First day of the billing cycle (not the signup date).
    pub start_date: NaiveDate,
    pub enrollment_date: Option<NaiveDate>,
    /// Cached running arrear; `None` means the member was never in arrears.
    pub current_arrear: Option<Amount>,
    pub arrear_last_updated: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// Who issued an invoice. Both paths are billed identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Creator {
    #[default]
    Admin,
    Staff(StaffId),
}

impl fmt::Display for Creator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Creator::Admin => write!(f, "admin"),
            Creator::Staff(id) => write!(f, "staff:{id}"),
        }
    }
}

/// Sequential invoice number, rendered as `INV-0001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvoiceNumber(u32);

impl InvoiceNumber {
    const PREFIX: &'static str = "INV-";

    pub fn new(sequence: u32) -> Self {
        InvoiceNumber(sequence)
    }

    pub fn sequence(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04}", Self::PREFIX, self.0)
    }
}

/// An invoice creation request, as submitted by an admin or staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub invoice_date: NaiveDate,
    pub received_amount: Amount,
    pub received_arrear_amount: Amount,
    /// Used verbatim instead of the computed arrear.
    pub manual_arrear_amount: Option<Amount>,
    /// Used verbatim instead of the computed balance.
    pub manual_balance_amount: Option<Amount>,
    pub created_by: Creator,
}

impl InvoiceRequest {
    pub fn new(user_id: UserId, plan_id: PlanId, invoice_date: NaiveDate) -> Self {
        Self {
            user_id,
            plan_id,
            invoice_date,
            received_amount: Amount::ZERO,
            received_arrear_amount: Amount::ZERO,
            manual_arrear_amount: None,
            manual_balance_amount: None,
            created_by: Creator::Admin,
        }
    }

    pub fn received(mut self, amount: Amount, arrear: Amount) -> Self {
        self.received_amount = amount;
        self.received_arrear_amount = arrear;
        self
    }

    pub fn manual_arrear(mut self, amount: Amount) -> Self {
        self.manual_arrear_amount = Some(amount);
        self
    }

    pub fn manual_balance(mut self, amount: Amount) -> Self {
        self.manual_balance_amount = Some(amount);
        self
    }

    pub fn by(mut self, creator: Creator) -> Self {
        self.created_by = creator;
        self
    }
}

/// One billing event for one enrollment. Never recomputed once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub invoice_number: InvoiceNumber,
    pub enrollment_id: EnrollmentId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub customer_name: String,
    pub plan_name: String,
    pub invoice_date: NaiveDate,
    /// Display month, e.g. "January 2025".
    pub payment_month: String,
    pub due_number: u32,
    pub due_amount: Amount,
    /// Gross arrear: the previous invoice's outstanding balance.
    pub arr_amount: Amount,
    /// Net arrear actually billed.
    pub arrear_amount: Amount,
    pub received_amount: Amount,
    pub received_arrear_amount: Amount,
    pub total_received_amount: Amount,
    pub previous_balance: Amount,
    pub balance_amount: Amount,
    /// `due_amount + arrear_amount`: what was billed, not what remains.
    pub total_amount: Amount,
    pub created_by: Creator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_is_zero_padded() {
        assert_eq!(InvoiceNumber::new(1).to_string(), "INV-0001");
        assert_eq!(InvoiceNumber::new(42).to_string(), "INV-0042");
        assert_eq!(InvoiceNumber::new(12345).to_string(), "INV-12345");
    }

    #[test]
    fn invoice_numbers_order_numerically() {
        assert!(InvoiceNumber::new(9999) < InvoiceNumber::new(10000));
    }

    #[test]
    fn request_builder_sets_overrides() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let request = InvoiceRequest::new(1, 2, date)
            .received(Amount::from_major(100), Amount::from_major(5))
            .manual_arrear(Amount::from_major(7))
            .by(Creator::Staff(9));

        assert_eq!(request.received_amount, Amount::from_major(100));
        assert_eq!(request.received_arrear_amount, Amount::from_major(5));
        assert_eq!(request.manual_arrear_amount, Some(Amount::from_major(7)));
        assert_eq!(request.manual_balance_amount, None);
        assert_eq!(request.created_by, Creator::Staff(9));
    }

    #[test]
    fn creator_display() {
        assert_eq!(Creator::Admin.to_string(), "admin");
        assert_eq!(Creator::Staff(3).to_string(), "staff:3");
    }
}
