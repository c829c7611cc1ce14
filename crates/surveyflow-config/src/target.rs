//! Draft navigation targets.
//!
//! Authors describe where a question leads with a nullable integer:
//!
//! ```json
//! {
//!   "default_next_index": -1,
//!   "option_next_indexes": { "0": null, "1": 3 }
//! }
//! ```
//!
//! - absent or `-1` → fall through to the next question by position
//! - `null` → end the survey
//! - `i >= 0` → jump to the question currently at draft position `i`
//!
//! The integer encoding only exists on the wire. Inside the crate it is
//! decoded once into [`DraftTarget`].

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Wire value meaning "next question by position".
pub const SENTINEL_SEQUENTIAL: i64 = -1;

/// A navigation target expressed against draft positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DraftTarget {
  #[default]
  Sequential,
  End,
  Question(usize),
}

/// Returned for negative wire values other than [`SENTINEL_SEQUENTIAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid draft target {0}: expected -1, null, or a question index")]
pub struct InvalidDraftTarget(pub i64);

impl DraftTarget {
  /// Decode the wire representation.
  pub fn from_raw(raw: Option<i64>) -> Result<Self, InvalidDraftTarget> {
    match raw {
      None => Ok(DraftTarget::End),
      Some(SENTINEL_SEQUENTIAL) => Ok(DraftTarget::Sequential),
      Some(index) => usize::try_from(index)
        .map(DraftTarget::Question)
        .map_err(|_| InvalidDraftTarget(index)),
    }
  }

  /// Encode back into the wire representation.
  pub fn to_raw(self) -> Option<i64> {
    match self {
      DraftTarget::Sequential => Some(SENTINEL_SEQUENTIAL),
      DraftTarget::End => None,
      DraftTarget::Question(index) => Some(index as i64),
    }
  }
}

impl Serialize for DraftTarget {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.to_raw().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for DraftTarget {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = Option::<i64>::deserialize(deserializer)?;
    DraftTarget::from_raw(raw).map_err(de::Error::custom)
  }
}
