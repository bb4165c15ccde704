pub mod amount;
pub mod calendar;
pub mod config;
pub mod csv;
pub mod engine;
pub mod model;
pub mod store;

pub use amount::Amount;
pub use config::BillingPolicy;
pub use engine::{BillingEngine, EngineError};
pub use model::{Creator, Enrollment, Invoice, InvoiceNumber, InvoiceRequest, Plan, User};
pub use store::{InvoiceLookup, MemoryStore, Store};
