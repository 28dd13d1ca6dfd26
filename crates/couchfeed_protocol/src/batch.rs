//! Single-document changes bodies (`normal` and `longpoll`).

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::ChangeRecord;
use crate::seq::Seq;
use serde::{Deserialize, Serialize};

/// A complete `{results, last_seq}` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesBatch {
    /// Changes in feed order.
    pub results: Vec<ChangeRecord>,
    /// Position to resume from after this batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seq: Option<Seq>,
    /// Number of changes the server still holds past `last_seq`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<u64>,
}

impl ChangesBatch {
    /// Creates a batch.
    pub fn new(results: Vec<ChangeRecord>, last_seq: impl Into<Seq>) -> Self {
        Self {
            results,
            last_seq: Some(last_seq.into()),
            pending: None,
        }
    }

    /// Decodes a complete response body.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(bytes).map_err(ProtocolError::malformed_batch)
    }

    /// Encodes the batch as a response body.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ProtocolError::encoding_failed)
    }

    /// Returns the cursor to resume from once the batch is consumed.
    ///
    /// Falls back to the last record's `seq` when the server omitted `last_seq`.
    pub fn resume_seq(&self) -> Option<Seq> {
        self.last_seq
            .clone()
            .or_else(|| self.results.last().map(|r| r.seq.clone()))
    }
}
