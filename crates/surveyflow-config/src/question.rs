use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::QuestionKind;
use crate::target::DraftTarget;

/// A question as submitted by an author, before persistence.
///
/// Navigation targets refer to other questions by their position in the
/// enclosing [`DraftSurvey`](crate::DraftSurvey).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftQuestion {
  pub text: String,
  pub kind: QuestionKind,
  #[serde(default = "default_required")]
  pub is_required: bool,
  /// Ordered option labels; only meaningful for choice kinds.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub options: Vec<String>,
  /// Where the question leads when no branch override applies.
  #[serde(default)]
  pub default_next_index: DraftTarget,
  /// Per-option overrides, keyed by option (or rating scale) index.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub option_next_indexes: BTreeMap<usize, DraftTarget>,
}

fn default_required() -> bool {
  true
}

impl DraftQuestion {
  /// A question with no options and sequential navigation.
  pub fn new(text: impl Into<String>, kind: QuestionKind) -> Self {
    Self {
      text: text.into(),
      kind,
      is_required: true,
      options: Vec::new(),
      default_next_index: DraftTarget::Sequential,
      option_next_indexes: BTreeMap::new(),
    }
  }

  pub fn with_options<I, S>(mut self, options: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.options = options.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_default_next(mut self, target: DraftTarget) -> Self {
    self.default_next_index = target;
    self
  }

  pub fn with_option_next(mut self, option: usize, target: DraftTarget) -> Self {
    self.option_next_indexes.insert(option, target);
    self
  }

  pub fn optional(mut self) -> Self {
    self.is_required = false;
    self
  }
}
