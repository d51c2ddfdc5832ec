use chrono::FixedOffset;
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Deserialize a value leniently: any shape mismatch becomes `None` instead
/// of an error. The ledger export is heterogeneous (null detail arrays,
/// batches with pieces missing or mistyped), and a bad leaf must cost one
/// cell, not the whole run.
fn lenient<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(de)?;
    Ok(serde_json::from_value(value).ok())
}

/// Amounts arrive as JSON strings in most batches, as numbers in a few.
fn lenient_decimal<'de, D>(de: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(de)?;
    Ok(match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    })
}

/// Raw epoch value: an integer, or a string holding one. Anything else is
/// treated as absent, never as "now" or epoch zero.
fn lenient_epoch<'de, D>(de: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(de)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// One element of a loosely-typed JSON sequence: the payload is `None` when
/// the element doesn't have the expected shape (a string where an object
/// should be, etc.), so a garbage entry mid-list never poisons its siblings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(transparent, bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub(crate) struct Lax<T>(#[serde(deserialize_with = "lenient")] pub Option<T>);

/// One top-level record of the export. Only two keys matter; the rest of the
/// object is ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(crate) struct RawRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub posting_instruction_batch: Option<Batch>,
    #[serde(default, deserialize_with = "lenient_epoch")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(crate) struct Batch {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub posting_instructions: Option<Vec<Lax<Instruction>>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(crate) struct Instruction {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub committed_postings: Option<Vec<Lax<Posting>>>,
    #[serde(default, deserialize_with = "lenient")]
    pub custom_instruction: Option<CustomInstruction>,
    #[serde(default, deserialize_with = "lenient")]
    pub instruction_details: Option<Vec<Lax<InstructionDetail>>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(crate) struct CustomInstruction {
    #[serde(default, deserialize_with = "lenient")]
    pub postings: Option<Vec<Lax<Posting>>>,
}

/// Key/value annotation on an instruction; where `account_type` lives,
/// outside the posting/account model entirely.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(crate) struct InstructionDetail {
    #[serde(default, deserialize_with = "lenient")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub value: Option<String>,
}

/// A single posting entry, committed or custom. `credit` must be an actual
/// JSON boolean to count — a `"true"` string stays `None`, which is what the
/// credit-preferring selection relies on.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(crate) struct Posting {
    #[serde(default, deserialize_with = "lenient")]
    pub credit: Option<bool>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient")]
    pub denomination: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub account_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub account_address: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub asset: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub phase: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub internal_account_processing_label: Option<String>,
}

/// The flat output row for one input record. Built once by the resolver and
/// formatter, then only read by the assembler. A field that couldn't be
/// located anywhere stays `None` and renders as an empty cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ResolvedRecord {
    pub batch_id: Option<String>,
    pub credit: Option<bool>,
    pub amount: Option<Decimal>,
    pub denomination: Option<String>,
    pub account_id: Option<String>,
    pub account_type: Option<String>,
    pub account_address: Option<String>,
    pub asset: Option<String>,
    pub phase: Option<String>,
    pub internal_account_processing_label: Option<String>,
    pub posting_instruction_id: Option<String>,
    pub value_timestamp: Option<TimestampCell>,
    pub booking_timestamp: Option<TimestampCell>,
    pub readable_value_date: Option<String>,
    pub readable_booking_date: Option<String>,
}

/// What a timestamp column carries depends on the unit convention: the
/// milliseconds variant passes the raw epoch number through, the nanoseconds
/// variant writes the SQL-style text instead.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TimestampCell {
    Raw(i64),
    Formatted(String),
}

/// Rule for picking one posting among several candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SelectionPolicy {
    /// Always the first posting in the list.
    #[value(name = "first")]
    FirstOnly,
    /// The first posting with `credit == true` that carries the requested
    /// field; the first posting otherwise.
    PreferCredit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum TimestampUnit {
    Nanoseconds,
    Milliseconds,
}

/// Which column header exposes the amount. One historical report variant
/// called it `credit_amount`; it is the same field either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum AmountColumn {
    Amount,
    #[value(name = "credit_amount")]
    CreditAmount,
}

impl AmountColumn {
    pub(crate) fn column_name(self) -> &'static str {
        match self {
            AmountColumn::Amount => "amount",
            AmountColumn::CreditAmount => "credit_amount",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ReportConfig {
    pub selection: SelectionPolicy,
    pub timestamp_unit: TimestampUnit,
    pub tz_offset: FixedOffset,
    pub amount_column: AmountColumn,
    pub sheet_name: String,
    pub columns: Vec<String>,
}

/// The column orders the report variants shipped with. The milliseconds
/// variant is the longer one, with `account_type` and the readable dates.
pub(crate) fn default_columns(unit: TimestampUnit, amount: AmountColumn) -> Vec<String> {
    let names: &[&str] = match unit {
        TimestampUnit::Nanoseconds => &[
            "batch_id",
            "credit",
            "amount",
            "denomination",
            "account_id",
            "account_address",
            "asset",
            "phase",
            "internal_account_processing_label",
            "posting_instruction_id",
            "value_timestamp",
            "booking_timestamp",
        ],
        TimestampUnit::Milliseconds => &[
            "batch_id",
            "credit",
            "amount",
            "denomination",
            "account_id",
            "account_type",
            "account_address",
            "asset",
            "phase",
            "internal_account_processing_label",
            "posting_instruction_id",
            "value_timestamp",
            "readable_value_date",
            "booking_timestamp",
            "readable_booking_date",
        ],
    };
    names
        .iter()
        .map(|n| {
            if *n == "amount" {
                amount.column_name().to_string()
            } else {
                (*n).to_string()
            }
        })
        .collect()
}

/// Whole-run failures, the only errors this tool surfaces. Everything below
/// this level (bad nesting, wrong types, missing keys, empty collections)
/// resolves to an absent cell and the run keeps going.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to load {path}")]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
