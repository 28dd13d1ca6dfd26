//! Change record fixtures.

use couchfeed_protocol::ChangeRecord;
use serde_json::json;

/// Creates a live record with a single `1-<id>` revision.
pub fn record(seq: u64, id: &str) -> ChangeRecord {
    ChangeRecord::new(seq, id, vec![format!("1-{id}")])
}

/// Creates a deletion record.
pub fn deleted_record(seq: u64, id: &str) -> ChangeRecord {
    ChangeRecord::new(seq, id, vec![format!("2-{id}")]).with_deleted(true)
}

/// Creates a record carrying a small document body.
pub fn record_with_doc(seq: u64, id: &str) -> ChangeRecord {
    record(seq, id).with_document(json!({
        "_id": id,
        "_rev": format!("1-{id}"),
        "type": "user",
        "n": seq,
    }))
}

/// Creates `count` records with sequences `1..=count` and IDs `doc-1..`.
pub fn sample_records(count: u64) -> Vec<ChangeRecord> {
    (1..=count).map(|seq| record(seq, &format!("doc-{seq}"))).collect()
}

/// Records mixing deletions, document bodies and multi-byte IDs.
pub fn mixed_records() -> Vec<ChangeRecord> {
    vec![
        record(1, "alpha"),
        deleted_record(2, "beta"),
        record_with_doc(3, "gamma"),
        record(4, "ドキュメント"),
        record_with_doc(5, "naïve-café-€"),
    ]
}
