//! Document-store collaborator.
//!
//! The engine only talks to storage through [`Store`]. [`MemoryStore`] backs the CLI
//! and the tests; a database-backed implementation plugs in the same way.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{Enrollment, EnrollmentId, Invoice, InvoiceNumber, Plan, PlanId, User, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invoice number {0} already exists")]
    DuplicateInvoiceNumber(InvoiceNumber),
    #[error("could not allocate a unique invoice number after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error("store lock poisoned")]
    Poisoned,
}

/// Lookup of an enrollment's invoice history.
pub trait InvoiceLookup {
    /// The invoice with the latest `invoice_date` strictly before `before`.
    /// Ties on the same date go to the most recently numbered invoice.
    fn previous_invoice(
        &self,
        enrollment: EnrollmentId,
        before: NaiveDate,
    ) -> Result<Option<Invoice>, StoreError>;
}

/// Persistence operations the billing engine needs.
pub trait Store: InvoiceLookup {
    fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, StoreError>;

    fn save_plan(&self, plan: &Plan) -> Result<(), StoreError>;

    fn plan_ids(&self) -> Result<Vec<PlanId>, StoreError>;

    fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    fn find_enrollment(
        &self,
        user: UserId,
        plan: PlanId,
    ) -> Result<Option<Enrollment>, StoreError>;

    fn save_enrollment(&self, enrollment: &Enrollment) -> Result<(), StoreError>;

    /// Atomically increment the invoice counter and return the new value.
    fn next_invoice_sequence(&self) -> Result<u32, StoreError>;

    /// Insert a new invoice. Fails with [`StoreError::DuplicateInvoiceNumber`]
    /// if the number is taken.
    fn insert_invoice(&self, invoice: Invoice) -> Result<(), StoreError>;

    fn invoices_for(&self, enrollment: EnrollmentId) -> Result<Vec<Invoice>, StoreError>;
}

/// In-memory store, safe to share between threads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    plans: RwLock<HashMap<PlanId, Plan>>,
    users: RwLock<HashMap<UserId, User>>,
    enrollments: RwLock<HashMap<EnrollmentId, Enrollment>>,
    invoices: RwLock<BTreeMap<InvoiceNumber, Invoice>>,
    sequence: AtomicU32,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read().map_err(|_| StoreError::Poisoned)
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write().map_err(|_| StoreError::Poisoned)
}

/// Setup
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plans
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(plan.id, plan);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id, user);
        self
    }

    pub fn with_enrollment(mut self, enrollment: Enrollment) -> Self {
        self.enrollments
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(enrollment.id, enrollment);
        self
    }

    /// Load a historical invoice and move the counter past its number.
    pub fn seed_invoice(mut self, invoice: Invoice) -> Self {
        let number = invoice.invoice_number;
        self.invoices
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(number, invoice);
        self.sequence.fetch_max(number.sequence(), Ordering::SeqCst);
        self
    }
}

/// Inspection
impl MemoryStore {
    /// All invoices ordered by invoice number.
    pub fn invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        Ok(read(&self.invoices)?.values().cloned().collect())
    }

    pub fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        Ok(read(&self.enrollments)?.get(&id).cloned())
    }
}

impl InvoiceLookup for MemoryStore {
    fn previous_invoice(
        &self,
        enrollment: EnrollmentId,
        before: NaiveDate,
    ) -> Result<Option<Invoice>, StoreError> {
        let invoices = read(&self.invoices)?;
        Ok(invoices
            .values()
            .filter(|inv| inv.enrollment_id == enrollment && inv.invoice_date < before)
            .max_by_key(|inv| (inv.invoice_date, inv.invoice_number))
            .cloned())
    }
}

impl Store for MemoryStore {
    fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, StoreError> {
        Ok(read(&self.plans)?.get(&id).cloned())
    }

    fn save_plan(&self, plan: &Plan) -> Result<(), StoreError> {
        write(&self.plans)?.insert(plan.id, plan.clone());
        Ok(())
    }

    fn plan_ids(&self) -> Result<Vec<PlanId>, StoreError> {
        let mut ids: Vec<_> = read(&self.plans)?.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(read(&self.users)?.get(&id).cloned())
    }

    fn find_enrollment(
        &self,
        user: UserId,
        plan: PlanId,
    ) -> Result<Option<Enrollment>, StoreError> {
        Ok(read(&self.enrollments)?
            .values()
            .filter(|e| e.user_id == user && e.plan_id == plan)
            .min_by_key(|e| e.id)
            .cloned())
    }

    fn save_enrollment(&self, enrollment: &Enrollment) -> Result<(), StoreError> {
        write(&self.enrollments)?.insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    fn next_invoice_sequence(&self) -> Result<u32, StoreError> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn insert_invoice(&self, invoice: Invoice) -> Result<(), StoreError> {
        let mut invoices = write(&self.invoices)?;
        if invoices.contains_key(&invoice.invoice_number) {
            return Err(StoreError::DuplicateInvoiceNumber(invoice.invoice_number));
        }
        invoices.insert(invoice.invoice_number, invoice);
        Ok(())
    }

    fn invoices_for(&self, enrollment: EnrollmentId) -> Result<Vec<Invoice>, StoreError> {
        let mut found: Vec<_> = read(&self.invoices)?
            .values()
            .filter(|inv| inv.enrollment_id == enrollment)
            .cloned()
            .collect();
        found.sort_by_key(|inv| (inv.invoice_date, inv.invoice_number));
        Ok(found)
    }
}
