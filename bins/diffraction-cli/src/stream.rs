//! Streaming host: JSON-lines events on stdin, one JSON reply per event on stdout.
//!
//! A reader task parses stdin and feeds a bounded channel; a single consumer
//! applies events to the ledger strictly in arrival order. Ctrl+C stops
//! intake; queued events are not drained.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use diffraction_core::account::AccountName;
use diffraction_core::state::DistributionState;
use diffraction_core::transfer::TransferNotice;
use diffraction_node_lib::{DepositDisposition, DepositReceipt};

use crate::HostLedger;

/// One input line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Event {
    Transfer(TransferNotice),
    Activate { caller: AccountName },
    Deactivate { caller: AccountName },
    Reset { caller: AccountName },
    Status,
}

/// One output line.
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
enum Reply {
    Accepted { receipt: DepositReceipt },
    Ignored,
    State { state: DistributionState },
    Rejected { error: String },
}

/// Parsed event, or the reason a line could not be parsed.
type Incoming = Result<Event, String>;

pub async fn run(ledger: HostLedger, queue: usize) -> Result<()> {
    let ledger = Arc::new(ledger);
    let (tx, mut rx) = mpsc::channel::<Incoming>(queue.max(1));

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut line_no = 0u64;
        while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let incoming = serde_json::from_str::<Event>(&line).map_err(|e| {
                warn!(line = line_no, "malformed event: {e}");
                format!("malformed event on line {line_no}: {e}")
            });
            if tx.send(incoming).await.is_err() {
                break;
            }
        }
        anyhow::Ok(())
    });

    let processor = {
        let ledger = Arc::clone(&ledger);
        async move {
            let mut processed = 0u64;
            while let Some(incoming) = rx.recv().await {
                let reply = match incoming {
                    Ok(event) => apply(&ledger, event),
                    Err(error) => Reply::Rejected { error },
                };
                print_reply(&reply)?;
                processed += 1;
            }
            anyhow::Ok(processed)
        }
    };

    info!("processing events from stdin (Ctrl+C to stop)");

    tokio::select! {
        res = processor => {
            let processed = res?;
            reader.await.context("stdin reader panicked")??;
            info!(processed, "input closed");
        }
        _ = shutdown_signal() => {
            reader.abort();
            info!("shutdown signal received");
        }
    }

    ledger.inspect(|store| store.flush())?;
    Ok(())
}

fn apply(ledger: &HostLedger, event: Event) -> Reply {
    let result = match event {
        Event::Transfer(notice) => ledger.on_transfer(&notice).map(|d| match d {
            DepositDisposition::Accepted(receipt) => Reply::Accepted { receipt },
            DepositDisposition::Ignored => Reply::Ignored,
        }),
        Event::Activate { caller } => ledger.activate(&caller).map(|state| Reply::State { state }),
        Event::Deactivate { caller } => ledger.deactivate(&caller).map(|state| Reply::State { state }),
        Event::Reset { caller } => ledger.reset(&caller).map(|state| Reply::State { state }),
        Event::Status => ledger.state().map(|state| Reply::State { state }),
    };
    result.unwrap_or_else(|e| Reply::Rejected { error: e.to_string() })
}

fn print_reply(reply: &Reply) -> Result<()> {
    let line = serde_json::to_string(reply)?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{line}")?;
    out.flush()?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("received Ctrl+C, shutting down...");
}
