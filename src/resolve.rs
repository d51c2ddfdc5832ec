use crate::{
    data::{
        Batch, Instruction, Lax, Posting, RawRecord, ReportConfig, ResolvedRecord, SelectionPolicy,
    },
    timefmt,
};

/// Resolve one raw export record into a flat report row. This never fails:
/// every piece of missing or mistyped structure degrades to an absent field
/// on this record, which is what real-world export batches require (some
/// have no custom instruction, some carry null detail arrays).
pub(crate) fn resolve_record(raw: &RawRecord, config: &ReportConfig) -> ResolvedRecord {
    let batch = raw.posting_instruction_batch.as_ref();
    let policy = config.selection;
    let ts = timefmt::derive_columns(raw.timestamp, config.timestamp_unit, config.tz_offset);

    ResolvedRecord {
        batch_id: batch.and_then(|b| b.id.clone()),
        credit: posting_field(batch, policy, |p| p.credit),
        amount: posting_field(batch, policy, |p| p.amount),
        denomination: posting_field(batch, policy, |p| p.denomination.clone()),
        account_id: posting_field(batch, policy, |p| p.account_id.clone()),
        account_type: instruction_detail(batch, "account_type"),
        account_address: posting_field(batch, policy, |p| p.account_address.clone()),
        asset: posting_field(batch, policy, |p| p.asset.clone()),
        phase: posting_field(batch, policy, |p| p.phase.clone()),
        internal_account_processing_label: posting_field(batch, policy, |p| {
            p.internal_account_processing_label.clone()
        }),
        posting_instruction_id: first_instruction(batch).and_then(|i| i.id.clone()),
        value_timestamp: ts.value_timestamp,
        booking_timestamp: ts.booking_timestamp,
        readable_value_date: ts.readable_value_date,
        readable_booking_date: ts.readable_booking_date,
    }
}

/// Only the first instruction of a batch is ever consulted. Batches with
/// more than one instruction exist in the wild; discarding the rest is the
/// documented behavior of this report, not an accident.
fn first_instruction(batch: Option<&Batch>) -> Option<&Instruction> {
    batch?.posting_instructions.as_ref()?.first()?.0.as_ref()
}

/// Posting field resolution: committed postings first, custom-instruction
/// postings only when committed ones are absent, empty or not a sequence.
/// A selected committed posting that merely lacks the field yields an absent
/// cell; it does not re-open the custom fallback.
fn posting_field<T>(
    batch: Option<&Batch>,
    policy: SelectionPolicy,
    get: impl Fn(&Posting) -> Option<T>,
) -> Option<T> {
    let instruction = first_instruction(batch)?;
    if let Some(committed) = non_empty(instruction.committed_postings.as_deref()) {
        return select(committed, policy, get);
    }
    let custom = non_empty(instruction.custom_instruction.as_ref()?.postings.as_deref())?;
    select(custom, policy, get)
}

fn non_empty(postings: Option<&[Lax<Posting>]>) -> Option<&[Lax<Posting>]> {
    postings.filter(|p| !p.is_empty())
}

fn select<T>(
    postings: &[Lax<Posting>],
    policy: SelectionPolicy,
    get: impl Fn(&Posting) -> Option<T>,
) -> Option<T> {
    let first = postings.first().and_then(|p| p.0.as_ref());
    match policy {
        SelectionPolicy::FirstOnly => first.and_then(get),
        SelectionPolicy::PreferCredit => postings
            .iter()
            .filter_map(|p| p.0.as_ref())
            .filter(|p| p.credit == Some(true))
            .find_map(|p| get(p))
            .or_else(|| first.and_then(&get)),
    }
}

/// `account_type` is recovered from the instruction's key/value detail list,
/// not from any posting.
fn instruction_detail(batch: Option<&Batch>, key: &str) -> Option<String> {
    first_instruction(batch)?
        .instruction_details
        .as_ref()?
        .iter()
        .filter_map(|d| d.0.as_ref())
        .find(|d| d.key.as_deref() == Some(key))
        .and_then(|d| d.value.clone())
}
