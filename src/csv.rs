//! CSV ledger directory: reference data, invoice requests and invoice output.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Amount;
use crate::model::{
    Creator, Enrollment, EnrollmentId, Invoice, InvoiceRequest, MonthlyEntry, Plan, PlanId,
    StaffId, User, UserId,
};
use crate::store::MemoryStore;

pub const PLANS_FILE: &str = "plans.csv";
pub const SCHEDULE_FILE: &str = "schedule.csv";
pub const USERS_FILE: &str = "users.csv";
pub const ENROLLMENTS_FILE: &str = "enrollments.csv";
pub const INVOICES_FILE: &str = "invoices.csv";

/// Errors that can occur when reading ledger files
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("{}: cannot open: {source}", .path.display())]
    Open { path: PathBuf, source: csv::Error },

    #[error("{}: line {line}: failed to parse row: {source}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        source: csv::Error,
    },

    #[error("{}: line {line}: schedule for unknown plan {plan}", .path.display())]
    UnknownPlan {
        path: PathBuf,
        line: usize,
        plan: PlanId,
    },

    #[error("line {line}: unrecognized creator '{creator}'")]
    UnrecognizedCreator { line: usize, creator: String },

    #[error("line {line}: staff invoice missing staff id")]
    MissingStaffId { line: usize },
}

#[derive(Debug, Deserialize)]
struct PlanRow {
    plan: PlanId,
    name: String,
    duration: u32,
    total_amount: f64,
}

#[derive(Debug, Deserialize)]
struct ScheduleRow {
    plan: PlanId,
    month: u32,
    installment: Option<f64>,
    dividend: Option<f64>,
    payable: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    user: UserId,
    name: String,
}

#[derive(Debug, Deserialize)]
struct EnrollmentRow {
    enrollment: EnrollmentId,
    user: UserId,
    plan: PlanId,
    member_number: u32,
    start_date: NaiveDate,
    enrollment_date: Option<NaiveDate>,
    current_arrear: Option<f64>,
    arrear_last_updated: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct RequestRow {
    user: UserId,
    plan: PlanId,
    invoice_date: NaiveDate,
    received: Option<f64>,
    received_arrear: Option<f64>,
    manual_arrear: Option<f64>,
    manual_balance: Option<f64>,
    created_by: Option<String>,
    staff: Option<StaffId>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    invoice_number: String,
    enrollment: EnrollmentId,
    invoice_date: NaiveDate,
    payment_month: String,
    due_number: u32,
    due_amount: String,
    arr_amount: String,
    arrear_amount: String,
    received_amount: String,
    received_arrear_amount: String,
    total_amount: String,
    balance_amount: String,
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>, CsvError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Read every row of a reference file; the first bad row fails the whole file.
fn read_all<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, CsvError> {
    reader(path)?
        .into_deserialize::<T>()
        .enumerate()
        .map(|(idx, result)| {
            result.map_err(|source| CsvError::Parse {
                path: path.to_path_buf(),
                line: idx + 2, // 1-indexed, skip header
                source,
            })
        })
        .collect()
}

fn amount(value: Option<f64>) -> Option<Amount> {
    value.map(Amount::from_float)
}

/// Load plans, schedules, users and enrollments from a ledger directory
pub fn load_store(dir: impl AsRef<Path>) -> Result<MemoryStore, CsvError> {
    let dir = dir.as_ref();

    let mut plans: Vec<Plan> = read_all::<PlanRow>(&dir.join(PLANS_FILE))?
        .into_iter()
        .map(|row| Plan {
            id: row.plan,
            name: row.name,
            duration: row.duration,
            total_amount: Amount::from_float(row.total_amount),
            monthly_amount: Vec::new(),
            monthly_data: Vec::new(),
        })
        .collect();

    let schedule_path = dir.join(SCHEDULE_FILE);
    for (idx, row) in read_all::<ScheduleRow>(&schedule_path)?.into_iter().enumerate() {
        let plan = plans
            .iter_mut()
            .find(|plan| plan.id == row.plan)
            .ok_or_else(|| CsvError::UnknownPlan {
                path: schedule_path.clone(),
                line: idx + 2,
                plan: row.plan,
            })?;
        plan.monthly_data.push(MonthlyEntry {
            month_number: row.month,
            installment_amount: amount(row.installment),
            dividend: amount(row.dividend),
            payable_amount: amount(row.payable),
        });
    }

    let mut store = plans.into_iter().fold(MemoryStore::new(), MemoryStore::with_plan);

    for row in read_all::<UserRow>(&dir.join(USERS_FILE))? {
        store = store.with_user(User {
            id: row.user,
            name: row.name,
        });
    }

    for row in read_all::<EnrollmentRow>(&dir.join(ENROLLMENTS_FILE))? {
        store = store.with_enrollment(Enrollment {
            id: row.enrollment,
            user_id: row.user,
            plan_id: row.plan,
            member_number: row.member_number,
            start_date: row.start_date,
            enrollment_date: row.enrollment_date,
            current_arrear: amount(row.current_arrear),
            arrear_last_updated: row.arrear_last_updated,
        });
    }

    Ok(store)
}

/// Read invoice requests from a csv file, one result per row
pub fn read_invoice_requests(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<InvoiceRequest, CsvError>>, CsvError> {
    let path = path.as_ref().to_path_buf();
    let reader = reader(&path)?;

    Ok(reader
        .into_deserialize::<RequestRow>()
        .enumerate()
        .map(move |(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse {
                path: path.clone(),
                line,
                source,
            })?;
            let created_by = match row.created_by.as_deref().unwrap_or("admin") {
                "admin" | "" => Creator::Admin,
                "staff" => Creator::Staff(row.staff.ok_or(CsvError::MissingStaffId { line })?),
                other => {
                    return Err(CsvError::UnrecognizedCreator {
                        line,
                        creator: other.to_string(),
                    });
                }
            };
            Ok(InvoiceRequest {
                user_id: row.user,
                plan_id: row.plan,
                invoice_date: row.invoice_date,
                received_amount: amount(row.received).unwrap_or_default(),
                received_arrear_amount: amount(row.received_arrear).unwrap_or_default(),
                manual_arrear_amount: amount(row.manual_arrear),
                manual_balance_amount: amount(row.manual_balance),
                created_by,
            })
        }))
}

/// Write invoices in csv format
pub fn write_invoices<W: io::Write>(
    out: W,
    invoices: impl IntoIterator<Item = Invoice>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    for invoice in invoices {
        let row = OutputRow {
            invoice_number: invoice.invoice_number.to_string(),
            enrollment: invoice.enrollment_id,
            invoice_date: invoice.invoice_date,
            payment_month: invoice.payment_month,
            due_number: invoice.due_number,
            due_amount: invoice.due_amount.to_string(),
            arr_amount: invoice.arr_amount.to_string(),
            arrear_amount: invoice.arrear_amount.to_string(),
            received_amount: invoice.received_amount.to_string(),
            received_arrear_amount: invoice.received_arrear_amount.to_string(),
            total_amount: invoice.total_amount.to_string(),
            balance_amount: invoice.balance_amount.to_string(),
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}
