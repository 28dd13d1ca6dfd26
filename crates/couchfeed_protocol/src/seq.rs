//! Feed position tokens.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An opaque, server-assigned position in the changes feed.
///
/// Older servers emit plain integers, clustered servers emit strings such
/// as `"42-g1AAAA..."`. The client never interprets a token; it only echoes
/// the most recent one back as the `since` parameter. Any other JSON
/// shape, such as the `[3, "g1AA"]` arrays of legacy clustered servers, is
/// kept as-is and echoed back as compact JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seq {
    /// Integer sequence.
    Number(u64),
    /// String sequence.
    Text(String),
    /// Any other token shape.
    Other(Value),
}

impl Seq {
    /// Returns the token as it is sent in a query string.
    pub fn to_query_value(&self) -> String {
        self.to_string()
    }

    /// Returns the token for a "from now on" feed.
    pub fn now() -> Self {
        Seq::Text("now".into())
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seq::Number(n) => write!(f, "{n}"),
            Seq::Text(s) => f.write_str(s),
            Seq::Other(value) => write!(f, "{value}"),
        }
    }
}

impl Hash for Seq {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Seq::Number(n) => n.hash(state),
            Seq::Text(s) => s.hash(state),
            Seq::Other(value) => value.to_string().hash(state),
        }
    }
}

impl From<u64> for Seq {
    fn from(value: u64) -> Self {
        Seq::Number(value)
    }
}

impl From<&str> for Seq {
    fn from(value: &str) -> Self {
        Seq::Text(value.to_string())
    }
}

impl From<String> for Seq {
    fn from(value: String) -> Self {
        Seq::Text(value)
    }
}
