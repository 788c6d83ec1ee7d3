use derive_more::{Constructor, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Process-unique identifier for a single [`crate::trade::Trade`] record.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Constructor, From,
)]
pub struct TradeId(pub SmolStr);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TradeId {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

/// Unique identifier for a committed [`crate::match_result::MatchResult`].
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Constructor)]
pub struct MatchId(pub SmolStr);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MatchId {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}
