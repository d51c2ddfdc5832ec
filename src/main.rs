use anyhow::Result;
use clap::Parser;
use data::{AmountColumn, ReportConfig, ReportError, SelectionPolicy, TimestampUnit};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod data;
mod read;
mod resolve;
mod timefmt;
mod write;

/// Flatten a ledger JSON export (posting instruction batches) into an xlsx
/// transaction report.
#[derive(Parser, Debug)]
#[command(name = "posting-report", version, about)]
struct Cli {
    /// JSON export: a top-level array of batch records
    #[arg(short, long)]
    input: PathBuf,

    /// Destination .xlsx file
    #[arg(short, long)]
    output: PathBuf,

    /// How to pick a posting when an instruction carries several
    #[arg(long, value_enum, default_value = "first")]
    selection: SelectionPolicy,

    /// Unit of the raw `timestamp` field
    #[arg(long, value_enum, default_value = "nanoseconds")]
    timestamp_unit: TimestampUnit,

    /// Fixed offset for the readable date columns, e.g. +02:00
    #[arg(long, default_value = "+02:00")]
    tz_offset: String,

    /// Column header used for the amount field
    #[arg(long, value_enum, default_value = "amount")]
    amount_column: AmountColumn,

    /// Sheet name in the output workbook
    #[arg(long, default_value = "Transactions")]
    sheet: String,

    /// Comma-separated column order (defaults to the stock order for the
    /// chosen timestamp unit)
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let tz_offset = cli
        .tz_offset
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid --tz-offset {:?}: {e}", cli.tz_offset))?;
    let columns = cli
        .columns
        .unwrap_or_else(|| data::default_columns(cli.timestamp_unit, cli.amount_column));
    let config = ReportConfig {
        selection: cli.selection,
        timestamp_unit: cli.timestamp_unit,
        tz_offset,
        amount_column: cli.amount_column,
        sheet_name: cli.sheet,
        columns,
    };

    let file = File::open(&cli.input).map_err(|e| ReportError::Load {
        path: cli.input.clone(),
        source: e.into(),
    })?;
    let raw = read::read_batches(BufReader::new(file)).map_err(|e| ReportError::Load {
        path: cli.input.clone(),
        source: e,
    })?;
    info!("loaded {} records from {}", raw.len(), cli.input.display());

    let resolved: Vec<_> = raw
        .iter()
        .map(|r| resolve::resolve_record(r, &config))
        .collect();
    let with_batch_id = resolved.iter().filter(|r| r.batch_id.is_some()).count();
    info!(
        "resolved {} records ({} with a batch id) into {} columns",
        resolved.len(),
        with_batch_id,
        config.columns.len()
    );

    write::write_report(&cli.output, &config, &resolved)?;
    info!("report written to {}", cli.output.display());
    Ok(())
}
