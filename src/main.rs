use std::path::Path;
use std::{env, io, process};

use chit_billing::csv::{INVOICES_FILE, load_store, read_invoice_requests, write_invoices};
use chit_billing::{BillingEngine, BillingPolicy};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(
            "warn".parse().expect("static directive is valid"),
        ))
        .with_writer(io::stderr)
        .init();

    let Some(dir) = env::args().nth(1) else {
        error!("usage: chit-billing <ledger-dir>");
        process::exit(2);
    };

    let policy = BillingPolicy::from_env().unwrap_or_else(|e| {
        error!("{e}");
        process::exit(2);
    });

    let store = load_store(&dir).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });
    let requests = read_invoice_requests(Path::new(&dir).join(INVOICES_FILE)).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });

    let engine = BillingEngine::with_policy(store, policy);
    match engine.repair_plans() {
        Ok(0) => {}
        Ok(repaired) => info!(repaired, "plan schedules repaired"),
        Err(e) => warn!("plan repair failed: {e}"),
    }

    let (request_sender, request_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in requests {
            match result {
                Ok(request) => {
                    if request_sender.send(request).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    let created = engine.run(ReceiverStream::new(request_receiver)).await;
    info!(created, "invoices created");

    let invoices = engine.store().invoices().unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });
    if let Err(e) = write_invoices(io::stdout().lock(), invoices) {
        error!("failed to write invoices: {e}");
        process::exit(1);
    }
}
