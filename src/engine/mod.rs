//! Invoice billing-cycle engine.
//!
//! Computes the due number, due amount, arrear and balance of a new invoice from the
//! enrollment's billing history, then persists it under a fresh invoice number.
//! Also supports an async stream of invoice requests.

use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::Amount;
use crate::calendar::format_payment_month;
use crate::config::BillingPolicy;
use crate::model::{Enrollment, Invoice, InvoiceNumber, InvoiceRequest, Plan};
use crate::store::{Store, StoreError};

mod arrear;
pub use arrear::calculate_arrear_amount;

mod balance;
pub use balance::{calculate_balance_amount, previous_balance};

mod due;
pub use due::calculate_due_number;

mod schedule;
pub use schedule::{due_amount, heal_monthly_amount};

mod error;
pub use error::{EngineError, NotFoundError, ValidationError};

/// How many invoice numbers are tried before giving up on a collision.
pub const MAX_NUMBER_ATTEMPTS: u32 = 3;

/// The billing engine. Admin and staff requests both go through
/// [`BillingEngine::create_invoice`].
pub struct BillingEngine<S> {
    store: S,
    policy: BillingPolicy,
}

/// Public API
impl<S: Store> BillingEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, BillingPolicy::default())
    }

    pub fn with_policy(store: S, policy: BillingPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &BillingPolicy {
        &self.policy
    }

    /// Create an invoice for every request in the stream. Returns how many were created.
    pub async fn run(&self, mut stream: impl Stream<Item = InvoiceRequest> + Unpin) -> usize {
        let mut created = 0;
        while let Some(request) = stream.next().await {
            // a rejected request must not stop the batch
            if self.create_invoice(request).is_ok() {
                created += 1;
            }
        }
        created
    }

    /// Compute and persist the next invoice for the request's enrollment.
    pub fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice, EngineError> {
        let result = self.assemble(&request);
        Self::log_result(&request, &result);
        result
    }

    /// Heal the monthly-amount cache of every plan. Returns the number of plans repaired.
    pub fn repair_plans(&self) -> Result<usize, EngineError> {
        let mut repaired = 0;
        for id in self.store.plan_ids()? {
            let plan = self.store.find_plan(id)?.ok_or(NotFoundError::Plan(id))?;
            if self.heal_plan(plan)?.1 {
                repaired += 1;
            }
        }
        Ok(repaired)
    }
}

/// Private API
impl<S: Store> BillingEngine<S> {
    /// Small helper to log `create_invoice` results
    fn log_result(request: &InvoiceRequest, result: &Result<Invoice, EngineError>) {
        match result {
            Ok(invoice) => {
                info!(
                    invoice = %invoice.invoice_number,
                    user = request.user_id,
                    plan = request.plan_id,
                    date = %request.invoice_date,
                    due_number = invoice.due_number,
                    total = %invoice.total_amount,
                    balance = %invoice.balance_amount,
                    created_by = %request.created_by,
                    "invoice created"
                );
            }
            Err(e) => {
                info!(
                    user = request.user_id,
                    plan = request.plan_id,
                    date = %request.invoice_date,
                    created_by = %request.created_by,
                    reason = %e,
                    "invoice skipped"
                );
            }
        }
    }

    /// Build the invoice in order:
    /// - Validate received amounts
    /// - Resolve enrollment, plan and customer (all lookups before any write)
    /// - Heal the plan schedule
    /// - Due number, due amount
    /// - Previous invoice, arrear, previous balance, balance
    /// - Persist under a fresh number, then refresh the enrollment's arrear snapshot
    fn assemble(&self, request: &InvoiceRequest) -> Result<Invoice, EngineError> {
        check_received("received_amount", request.received_amount)?;
        check_received("received_arrear_amount", request.received_arrear_amount)?;

        let enrollment = self
            .store
            .find_enrollment(request.user_id, request.plan_id)?
            .ok_or(NotFoundError::Enrollment {
                user: request.user_id,
                plan: request.plan_id,
            })?;
        let plan = self
            .store
            .find_plan(enrollment.plan_id)?
            .ok_or(NotFoundError::Plan(enrollment.plan_id))?;
        let user = self
            .store
            .find_user(enrollment.user_id)?
            .ok_or(NotFoundError::User(enrollment.user_id))?;

        if user.name.trim().is_empty() {
            return Err(ValidationError::MissingCustomerName(user.id).into());
        }
        if plan.name.trim().is_empty() {
            return Err(ValidationError::MissingPlanName(plan.id).into());
        }

        let (plan, _) = self.heal_plan(plan)?;

        let invoice_date = request.invoice_date;
        let due_number = calculate_due_number(
            plan.id,
            enrollment.start_date,
            invoice_date,
            plan.duration,
            &self.policy,
        )?;
        let due_amount = due_amount(&plan, due_number)?;

        let previous = self.store.previous_invoice(enrollment.id, invoice_date)?;

        // a follow-up inside the same due period keeps the arrear the period opened with
        let arrear_amount = match (request.manual_arrear_amount, &previous) {
            (Some(manual), _) => manual,
            (None, Some(prev)) if prev.due_number == due_number => prev.arrear_amount,
            (None, _) => {
                calculate_arrear_amount(enrollment.id, &self.store, invoice_date, &enrollment)?
            }
        };
        let arr_amount = previous
            .as_ref()
            .map_or(Amount::ZERO, |invoice| invoice.balance_amount);

        let previous_balance = previous_balance(
            previous.as_ref(),
            due_number,
            due_amount,
            arrear_amount,
            invoice_date,
            &self.policy,
        );
        let balance_amount = match request.manual_balance_amount {
            Some(manual) => manual,
            None => calculate_balance_amount(
                due_amount,
                arrear_amount,
                request.received_amount,
                invoice_date,
                previous_balance,
                request.received_arrear_amount,
                &self.policy,
            ),
        };

        debug!(
            enrollment = enrollment.id,
            due_number,
            due = %due_amount,
            arrear = %arrear_amount,
            previous_balance = %previous_balance,
            balance = %balance_amount,
            "invoice computed"
        );

        let invoice = self.persist(|invoice_number| Invoice {
            invoice_number,
            enrollment_id: enrollment.id,
            user_id: user.id,
            plan_id: plan.id,
            customer_name: user.name.clone(),
            plan_name: plan.name.clone(),
            invoice_date,
            payment_month: format_payment_month(invoice_date),
            due_number,
            due_amount,
            arr_amount,
            arrear_amount,
            received_amount: request.received_amount,
            received_arrear_amount: request.received_arrear_amount,
            total_received_amount: request.received_amount + request.received_arrear_amount,
            previous_balance,
            balance_amount,
            total_amount: due_amount + arrear_amount,
            created_by: request.created_by,
        })?;

        self.refresh_arrear(enrollment, &invoice)?;
        Ok(invoice)
    }

    /// Heal the plan's monthly-amount cache, saving it if it changed.
    fn heal_plan(&self, mut plan: Plan) -> Result<(Plan, bool), StoreError> {
        let stale = plan.monthly_amount.len();
        if !heal_monthly_amount(&mut plan) {
            return Ok((plan, false));
        }
        warn!(
            plan = plan.id,
            duration = plan.duration,
            stale_len = stale,
            "monthly amounts out of sync with schedule, rebuilt"
        );
        self.store.save_plan(&plan)?;
        Ok((plan, true))
    }

    /// Insert the invoice under the next free number, retrying on collision.
    fn persist(&self, build: impl Fn(InvoiceNumber) -> Invoice) -> Result<Invoice, StoreError> {
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let number = InvoiceNumber::new(self.store.next_invoice_sequence()?);
            let invoice = build(number);
            match self.store.insert_invoice(invoice.clone()) {
                Ok(()) => return Ok(invoice),
                Err(StoreError::DuplicateInvoiceNumber(taken)) => {
                    warn!(invoice = %taken, attempt, "invoice number taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Exhausted {
            attempts: MAX_NUMBER_ATTEMPTS,
        })
    }

    /// Record the invoice's unpaid balance as the enrollment's current arrear,
    /// unless the snapshot is already newer than this invoice.
    fn refresh_arrear(
        &self,
        mut enrollment: Enrollment,
        invoice: &Invoice,
    ) -> Result<(), StoreError> {
        if enrollment
            .arrear_last_updated
            .is_some_and(|last| last > invoice.invoice_date)
        {
            debug!(
                enrollment = enrollment.id,
                invoice = %invoice.invoice_number,
                "backdated invoice, arrear snapshot kept"
            );
            return Ok(());
        }
        enrollment.current_arrear = Some(invoice.balance_amount.non_negative());
        enrollment.arrear_last_updated = Some(invoice.invoice_date);
        self.store.save_enrollment(&enrollment)
    }
}

fn check_received(field: &'static str, amount: Amount) -> Result<(), ValidationError> {
    if amount.is_negative() {
        return Err(ValidationError::NegativeReceived { field, amount });
    }
    Ok(())
}
