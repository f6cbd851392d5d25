use clap::Parser;
use corebank::application::engine::TransferEngine;
use corebank::domain::ports::LedgerStoreBox;
use corebank::error::LedgerError;
use corebank::infrastructure::in_memory::InMemoryLedger;
#[cfg(feature = "storage-rocksdb")]
use corebank::infrastructure::rocksdb::RocksDbLedger;
use corebank::interfaces::csv::account_writer::AccountWriter;
use corebank::interfaces::csv::operation_reader::{Operation, OperationReader, OperationType};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(cli: &Cli) -> Result<LedgerStoreBox> {
    match &cli.db_path {
        Some(db_path) => Ok(Box::new(
            RocksDbLedger::open(db_path).into_diagnostic()?,
        )),
        None => Ok(Box::new(InMemoryLedger::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(_cli: &Cli) -> Result<LedgerStoreBox> {
    Ok(Box::new(InMemoryLedger::new()))
}

async fn apply(engine: &TransferEngine, op: Operation) -> corebank::error::Result<()> {
    match op.r#type {
        OperationType::Open => {
            let owner = op.owner.ok_or_else(|| {
                LedgerError::InvalidArgument("open requires an owner".to_string())
            })?;
            let currency = op.currency.ok_or_else(|| {
                LedgerError::InvalidArgument("open requires a currency".to_string())
            })?;
            let opening_balance = op.amount.unwrap_or(Decimal::ZERO);
            engine.open_account(owner, currency, opening_balance).await?;
        }
        OperationType::Transfer => {
            let from = op.from.ok_or_else(|| {
                LedgerError::InvalidArgument("transfer requires a from account".to_string())
            })?;
            let to = op.to.ok_or_else(|| {
                LedgerError::InvalidArgument("transfer requires a to account".to_string())
            })?;
            let amount = op.amount.ok_or_else(|| {
                LedgerError::InvalidArgument("transfer requires an amount".to_string())
            })?;
            engine.transfer(from, to, amount).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let engine = TransferEngine::new(open_store(&cli)?);

    // Replay operations
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for op_result in reader.operations() {
        match op_result {
            Ok(op) => {
                if let Err(e) = apply(&engine, op).await {
                    eprintln!("Error applying operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    // Output final state
    let accounts = engine.into_results().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(accounts).into_diagnostic()?;

    Ok(())
}
