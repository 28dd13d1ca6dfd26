//! Property-based test generators using proptest.

use couchfeed_protocol::{ChangeRecord, Seq};
use proptest::prelude::*;
use serde_json::json;

/// Strategy for sequence tokens, numeric or opaque text.
pub fn seq_strategy() -> impl Strategy<Value = Seq> {
    prop_oneof![
        any::<u32>().prop_map(|n| Seq::from(u64::from(n))),
        (1u32..100_000, "[A-Za-z0-9_]{4,24}").prop_map(|(n, tail)| Seq::from(format!("{n}-{tail}"))),
    ]
}

/// Strategy for document IDs, including multi-byte characters.
pub fn doc_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_:éü€中文ドキュ-]{1,24}").expect("Invalid regex")
}

/// Strategy for a single change record.
pub fn change_record_strategy() -> impl Strategy<Value = ChangeRecord> {
    (
        seq_strategy(),
        doc_id_strategy(),
        prop::collection::vec("[1-9]-[a-f0-9]{8}", 1..3),
        any::<bool>(),
        prop::option::of((any::<i32>(), "[a-zA-Zé ]{0,12}")),
    )
        .prop_map(|(seq, id, revisions, deleted, doc)| {
            let mut record = ChangeRecord::new(seq, id.clone(), revisions).with_deleted(deleted);
            if let Some((n, name)) = doc {
                record = record.with_document(json!({ "_id": id, "n": n, "name": name }));
            }
            record
        })
}

/// Strategy for a feed of up to `max` records with strictly increasing
/// numeric sequences starting at 1.
pub fn change_records_strategy(max: usize) -> impl Strategy<Value = Vec<ChangeRecord>> {
    prop::collection::vec(change_record_strategy(), 1..=max.max(1)).prop_map(|records| {
        records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                record.seq = Seq::from(i as u64 + 1);
                record
            })
            .collect()
    })
}

/// Strategy for cut points into a body of `len` bytes.
///
/// Feed the result to [`split_at_points`](crate::chunking::split_at_points).
pub fn chunking_strategy(len: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..=len, 0..12)
}
