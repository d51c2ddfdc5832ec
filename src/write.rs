use crate::data::{ReportConfig, ReportError, ResolvedRecord, TimestampCell};
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Workbook, XlsxError};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Padding added on top of the longest cell when sizing a column.
const COLUMN_PADDING: usize = 2;

/// One output cell. `Empty` is a real state: a field that resolved to
/// absent keeps its column and renders blank.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(t) => t.clone(),
        }
    }
}

/// Project the configured column order over the resolved records. Configured
/// names that aren't known fields are dropped (with a warning); known fields
/// with no value become empty cells. Every record yields a row, even a fully
/// absent one.
pub(crate) fn assemble(
    config: &ReportConfig,
    records: &[ResolvedRecord],
) -> (Vec<String>, Vec<Vec<Cell>>) {
    let probe = ResolvedRecord::default();
    let header: Vec<String> = config
        .columns
        .iter()
        .filter(|name| {
            let known = cell_for(&probe, name, config).is_some();
            if !known {
                warn!("dropping unknown column {name:?} from the report");
            }
            known
        })
        .cloned()
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            header
                .iter()
                .map(|name| cell_for(record, name, config).unwrap_or(Cell::Empty))
                .collect()
        })
        .collect();

    (header, rows)
}

fn cell_for(record: &ResolvedRecord, column: &str, config: &ReportConfig) -> Option<Cell> {
    let cell = match column {
        c if c == config.amount_column.column_name() => record
            .amount
            .and_then(|d| d.to_f64())
            .map(Cell::Number)
            .unwrap_or(Cell::Empty),
        "batch_id" => text(&record.batch_id),
        "credit" => record.credit.map(Cell::Bool).unwrap_or(Cell::Empty),
        "denomination" => text(&record.denomination),
        "account_id" => text(&record.account_id),
        "account_type" => text(&record.account_type),
        "account_address" => text(&record.account_address),
        "asset" => text(&record.asset),
        "phase" => text(&record.phase),
        "internal_account_processing_label" => text(&record.internal_account_processing_label),
        "posting_instruction_id" => text(&record.posting_instruction_id),
        "value_timestamp" => timestamp(&record.value_timestamp),
        "booking_timestamp" => timestamp(&record.booking_timestamp),
        "readable_value_date" => text(&record.readable_value_date),
        "readable_booking_date" => text(&record.readable_booking_date),
        _ => return None,
    };
    Some(cell)
}

fn text(value: &Option<String>) -> Cell {
    value.clone().map(Cell::Text).unwrap_or(Cell::Empty)
}

fn timestamp(value: &Option<TimestampCell>) -> Cell {
    match value {
        Some(TimestampCell::Raw(n)) => Cell::Number(*n as f64),
        Some(TimestampCell::Formatted(s)) => Cell::Text(s.clone()),
        None => Cell::Empty,
    }
}

/// Write the report workbook. The workbook is rendered to memory first and
/// moved into place with a rename, so a failed run never leaves a
/// half-written file at the destination.
pub(crate) fn write_report(
    path: &Path,
    config: &ReportConfig,
    records: &[ResolvedRecord],
) -> Result<(), ReportError> {
    let (header, rows) = assemble(config, records);
    let write_err = |source: anyhow::Error| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let buffer =
        build_workbook(&header, &rows, &config.sheet_name).map_err(|e| write_err(e.into()))?;

    let tmp = path.with_extension("xlsx.tmp");
    fs::write(&tmp, &buffer).map_err(|e| write_err(e.into()))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        write_err(e.into())
    })
}

fn build_workbook(
    header: &[String],
    rows: &[Vec<Cell>],
    sheet_name: &str,
) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;

    for (col, name) in header.iter().enumerate() {
        sheet.write_string(0, col as u16, name)?;
    }
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32 + 1, col as u16);
            match cell {
                Cell::Empty => {}
                Cell::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                Cell::Number(n) => {
                    sheet.write_number(r, c, *n)?;
                }
                Cell::Text(t) => {
                    sheet.write_string(r, c, t)?;
                }
            }
        }
    }

    for (col, name) in header.iter().enumerate() {
        let width = column_width(name, rows, col);
        sheet.set_column_width(col as u16, width as f64)?;
    }

    workbook.save_to_buffer()
}

/// Width = longest rendered cell in the column (header included) plus a
/// constant pad. Presentational only.
fn column_width(header: &str, rows: &[Vec<Cell>], col: usize) -> usize {
    rows.iter()
        .map(|row| row[col].as_text().chars().count())
        .max()
        .unwrap_or(0)
        .max(header.chars().count())
        + COLUMN_PADDING
}

#[cfg(test)]
mod tests {
    use super::{assemble, write_report, Cell};
    use crate::data::{
        default_columns, AmountColumn, ReportConfig, ResolvedRecord, SelectionPolicy,
        TimestampCell, TimestampUnit,
    };
    use chrono::FixedOffset;
    use rust_decimal_macros::dec;

    fn config(columns: Vec<String>) -> ReportConfig {
        ReportConfig {
            selection: SelectionPolicy::FirstOnly,
            timestamp_unit: TimestampUnit::Milliseconds,
            tz_offset: FixedOffset::east_opt(2 * 3600).unwrap(),
            amount_column: AmountColumn::Amount,
            sheet_name: "Transactions".to_string(),
            columns,
        }
    }

    fn sample_record() -> ResolvedRecord {
        ResolvedRecord {
            batch_id: Some("batch-1".to_string()),
            credit: Some(true),
            amount: Some(dec!(9.50)),
            denomination: Some("EUR".to_string()),
            value_timestamp: Some(TimestampCell::Raw(1_700_000_000_000)),
            booking_timestamp: Some(TimestampCell::Raw(1_700_000_000_000)),
            readable_value_date: Some("2023-11-15 00:13:20.000 +0200".to_string()),
            readable_booking_date: Some("2023-11-15 00:13:20.000 +0200".to_string()),
            ..ResolvedRecord::default()
        }
    }

    #[test]
    fn one_row_per_record_even_when_fully_absent() {
        let records = vec![
            sample_record(),
            ResolvedRecord {
                batch_id: Some("batch-2".to_string()),
                ..ResolvedRecord::default()
            },
            ResolvedRecord::default(),
        ];
        let cfg = config(default_columns(
            TimestampUnit::Milliseconds,
            AmountColumn::Amount,
        ));
        let (header, rows) = assemble(&cfg, &records);
        assert_eq!(header, cfg.columns);
        assert_eq!(rows.len(), 3);
        assert!(rows[2].iter().all(|c| *c == Cell::Empty));
        // partially absent rows keep their full width
        assert_eq!(rows[1].len(), header.len());
        assert_eq!(rows[1][0], Cell::Text("batch-2".to_string()));
        assert_eq!(rows[1][1], Cell::Empty);
    }

    #[test]
    fn unknown_columns_are_dropped() {
        let cfg = config(vec![
            "batch_id".to_string(),
            "no_such_field".to_string(),
            "credit".to_string(),
        ]);
        let (header, rows) = assemble(&cfg, &[sample_record()]);
        assert_eq!(header, vec!["batch_id", "credit"]);
        assert_eq!(
            rows[0],
            vec![Cell::Text("batch-1".to_string()), Cell::Bool(true)]
        );
    }

    #[test]
    fn amount_column_name_follows_the_configuration() {
        let mut cfg = config(vec!["credit_amount".to_string(), "amount".to_string()]);
        cfg.amount_column = AmountColumn::CreditAmount;
        let (header, rows) = assemble(&cfg, &[sample_record()]);
        // "amount" is unknown under this configuration and gets dropped
        assert_eq!(header, vec!["credit_amount"]);
        assert_eq!(rows[0], vec![Cell::Number(9.5)]);
    }

    #[test]
    fn timestamp_cells_render_raw_or_formatted() {
        let mut record = sample_record();
        let cfg = config(vec![
            "value_timestamp".to_string(),
            "readable_value_date".to_string(),
        ]);
        let (_, rows) = assemble(&cfg, std::slice::from_ref(&record));
        assert_eq!(rows[0][0], Cell::Number(1_700_000_000_000.0));

        record.value_timestamp = Some(TimestampCell::Formatted(
            "2023-11-14 22:13:20".to_string(),
        ));
        let (_, rows) = assemble(&cfg, &[record]);
        assert_eq!(rows[0][0], Cell::Text("2023-11-14 22:13:20".to_string()));
    }

    #[test]
    fn report_file_is_produced_and_no_temp_is_left_behind() {
        let dir = std::env::temp_dir().join("posting-report-write-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("report.xlsx");
        let _ = std::fs::remove_file(&path);

        let cfg = config(default_columns(
            TimestampUnit::Milliseconds,
            AmountColumn::Amount,
        ));
        write_report(&path, &cfg, &[sample_record(), ResolvedRecord::default()]).unwrap();

        let written = std::fs::metadata(&path).unwrap();
        assert!(written.len() > 0);
        assert!(!path.with_extension("xlsx.tmp").exists());
        std::fs::remove_file(&path).unwrap();
    }
}
