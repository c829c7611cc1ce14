use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned to a question when it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub i64);

impl fmt::Display for QuestionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<i64> for QuestionId {
  fn from(id: i64) -> Self {
    Self(id)
  }
}
