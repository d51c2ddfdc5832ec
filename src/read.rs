use crate::data::{Lax, RawRecord};
use anyhow::Context;

/// Load the whole export: a JSON array of batch records, fully memory
/// resident. An element that isn't even an object still counts as a record —
/// it just resolves to an all-absent row later. Only a top-level structure
/// that isn't an array is a hard error.
pub(crate) fn read_batches<R: std::io::Read>(reader: R) -> Result<Vec<RawRecord>, anyhow::Error> {
    let records: Vec<Lax<RawRecord>> =
        serde_json::from_reader(reader).context("input is not a JSON array of records")?;
    Ok(records
        .into_iter()
        .map(|r| r.0.unwrap_or_default())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::read_batches;
    use crate::data::RawRecord;

    #[test]
    fn read_mixed_records() {
        let input = br#"[
            {"timestamp": 1700000000000,
             "posting_instruction_batch": {"id": "b-1", "posting_instructions": []},
             "some_other_key": "ignored"},
            42,
            {"timestamp": "not a number"}
        ]"#;
        let records = read_batches(&input[..]).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].timestamp, Some(1_700_000_000_000));
        assert_eq!(
            records[0]
                .posting_instruction_batch
                .as_ref()
                .unwrap()
                .id
                .as_deref(),
            Some("b-1")
        );
        assert_eq!(records[1], RawRecord::default());
        assert_eq!(records[2].timestamp, None);
    }

    #[test]
    fn numeric_string_timestamps_are_accepted() {
        let records = read_batches(&br#"[{"timestamp": "1700000000000"}]"#[..]).unwrap();
        assert_eq!(records[0].timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn top_level_must_be_an_array() {
        assert!(read_batches(&br#"{"posting_instruction_batch": {}}"#[..]).is_err());
        assert!(read_batches(&b"not json at all"[..]).is_err());
    }
}
