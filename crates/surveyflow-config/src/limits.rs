use serde::{Deserialize, Serialize};

/// Bounds enforced by the compiler's structural pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerLimits {
  /// Minimum question text length, in characters, after trimming.
  pub min_text_len: usize,
  /// Maximum question text length, in characters.
  pub max_text_len: usize,
  /// Minimum number of options on a choice question.
  pub min_options: usize,
  /// Maximum number of options on a choice question.
  pub max_options: usize,
  /// Maximum length of a single option, in characters.
  pub max_option_len: usize,
  /// Maximum number of questions in one survey.
  pub max_questions: usize,
}

impl Default for CompilerLimits {
  fn default() -> Self {
    Self {
      min_text_len: 1,
      max_text_len: 500,
      min_options: 2,
      max_options: 20,
      max_option_len: 100,
      max_questions: 100,
    }
  }
}
