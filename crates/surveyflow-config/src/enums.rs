use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lowest value on the rating scale.
pub const RATING_MIN: u8 = 1;
/// Highest value on the rating scale.
pub const RATING_MAX: u8 = 5;

/// The closed set of question kinds a survey may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
  Text,
  SingleChoice,
  MultipleChoice,
  Rating,
  Number,
  Date,
  Location,
}

impl QuestionKind {
  /// Whether individual answers may carry their own determinant.
  pub fn supports_branching(self) -> bool {
    matches!(self, QuestionKind::SingleChoice | QuestionKind::Rating)
  }

  /// Whether the question carries an author-supplied option list.
  pub fn has_options(self) -> bool {
    matches!(self, QuestionKind::SingleChoice | QuestionKind::MultipleChoice)
  }

  /// Number of branch slots a question of this kind exposes.
  ///
  /// Single choice questions branch per option; rating questions branch per
  /// scale value (`value - RATING_MIN`). Every other kind has no slots.
  pub fn branch_slots(self, option_count: usize) -> usize {
    match self {
      QuestionKind::SingleChoice => option_count,
      QuestionKind::Rating => usize::from(RATING_MAX - RATING_MIN) + 1,
      _ => 0,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      QuestionKind::Text => "text",
      QuestionKind::SingleChoice => "single_choice",
      QuestionKind::MultipleChoice => "multiple_choice",
      QuestionKind::Rating => "rating",
      QuestionKind::Number => "number",
      QuestionKind::Date => "date",
      QuestionKind::Location => "location",
    }
  }
}

impl fmt::Display for QuestionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Returned when parsing a kind name that is not part of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown question kind: {0}")]
pub struct UnknownQuestionKind(pub String);

impl FromStr for QuestionKind {
  type Err = UnknownQuestionKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "text" => Ok(QuestionKind::Text),
      "single_choice" => Ok(QuestionKind::SingleChoice),
      "multiple_choice" => Ok(QuestionKind::MultipleChoice),
      "rating" => Ok(QuestionKind::Rating),
      "number" => Ok(QuestionKind::Number),
      "date" => Ok(QuestionKind::Date),
      "location" => Ok(QuestionKind::Location),
      other => Err(UnknownQuestionKind(other.to_string())),
    }
  }
}
