//! Error types for invoice creation.

use chrono::NaiveDate;
use thiserror::Error;

use crate::Amount;
use crate::model::{PlanId, UserId};
use crate::store::StoreError;

/// Top-level error returned by
/// [`BillingEngine::create_invoice`](super::BillingEngine::create_invoice).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// HTTP status an API layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Validation(_) => 400,
            EngineError::NotFound(_) => 404,
            EngineError::Store(_) => 500,
        }
    }
}

/// The request or the stored data cannot produce a valid invoice.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("due number {due_number} exceeds plan duration {duration}; the plan has completed")]
    DueNumberExceedsDuration { due_number: u32, duration: u32 },

    #[error("invoice date {invoice_date} is before the enrollment start date {start_date}")]
    InvoiceBeforeStart {
        start_date: NaiveDate,
        invoice_date: NaiveDate,
    },

    #[error("plan {0} has no installments")]
    InvalidDuration(PlanId),

    #[error("plan {plan} has no monthly schedule for due {due_number}")]
    MissingSchedule { plan: PlanId, due_number: u32 },

    #[error("customer {0} has no name")]
    MissingCustomerName(UserId),

    #[error("plan {0} has no name")]
    MissingPlanName(PlanId),

    #[error("{field} cannot be negative: {amount}")]
    NegativeReceived { field: &'static str, amount: Amount },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("no enrollment for user {user} in plan {plan}")]
    Enrollment { user: UserId, plan: PlanId },

    #[error("plan {0}")]
    Plan(PlanId),

    #[error("user {0}")]
    User(UserId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let validation: EngineError = ValidationError::InvalidDuration(1).into();
        let not_found: EngineError = NotFoundError::Plan(1).into();
        let store: EngineError = StoreError::Poisoned.into();

        assert_eq!(validation.status_code(), 400);
        assert_eq!(not_found.status_code(), 404);
        assert_eq!(store.status_code(), 500);
    }

    #[test]
    fn messages_are_readable() {
        let err: EngineError = ValidationError::DueNumberExceedsDuration {
            due_number: 21,
            duration: 20,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "validation failed: due number 21 exceeds plan duration 20; the plan has completed"
        );

        let err: EngineError = NotFoundError::Enrollment { user: 3, plan: 4 }.into();
        assert_eq!(err.to_string(), "not found: no enrollment for user 3 in plan 4");
    }
}
