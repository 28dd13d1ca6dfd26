//! Change records.

use crate::error::{ProtocolError, ProtocolResult};
use crate::seq::Seq;
use serde::{Deserialize, Serialize};

/// A single per-document change reported by the feed.
///
/// Wire shape: `{"seq": .., "id": .., "changes": [{"rev": ..}], "deleted"?: true, "doc"?: {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Feed position of this change.
    pub seq: Seq,
    /// Document ID.
    pub id: String,
    /// Leaf revisions, in server order.
    #[serde(rename = "changes", with = "revisions")]
    pub revisions: Vec<String>,
    /// Whether the change is a deletion.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    /// Document body (only with `include_docs`).
    #[serde(rename = "doc", default, skip_serializing_if = "Option::is_none")]
    pub document: Option<serde_json::Value>,
}

impl ChangeRecord {
    /// Creates a record for a live (non-deleted) document without a body.
    pub fn new(seq: impl Into<Seq>, id: impl Into<String>, revisions: Vec<String>) -> Self {
        Self {
            seq: seq.into(),
            id: id.into(),
            revisions,
            deleted: false,
            document: None,
        }
    }

    /// Marks the record as a deletion.
    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Attaches a document body.
    pub fn with_document(mut self, document: serde_json::Value) -> Self {
        self.document = Some(document);
        self
    }

    /// Returns the winning-looking revision (first listed), if any.
    pub fn rev(&self) -> Option<&str> {
        self.revisions.first().map(String::as_str)
    }

    /// Encodes the record as one JSON line (without the trailing newline).
    pub fn to_json(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(ProtocolError::encoding_failed)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

mod revisions {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct RevRef<'a> {
        rev: &'a str,
    }

    #[derive(Deserialize)]
    struct Rev {
        rev: String,
    }

    pub fn serialize<S: Serializer>(revs: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        let wire: Vec<RevRef<'_>> = revs.iter().map(|r| RevRef { rev: r }).collect();
        wire.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let wire: Vec<Rev> = Vec::deserialize(deserializer)?;
        Ok(wire.into_iter().map(|r| r.rev).collect())
    }
}
