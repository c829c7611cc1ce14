use std::fmt;

use serde::Serialize;
use surveyflow_graph::ValidationReport;
use surveyflow_store::SurveyId;
use thiserror::Error;

/// A single problem with one field of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  /// Draft position of the offending question; `None` for survey-wide problems.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub question: Option<usize>,
  pub field: &'static str,
  pub message: String,
}

impl FieldError {
  pub(crate) fn survey(field: &'static str, message: impl Into<String>) -> Self {
    Self {
      question: None,
      field,
      message: message.into(),
    }
  }

  pub(crate) fn question(index: usize, field: &'static str, message: impl Into<String>) -> Self {
    Self {
      question: Some(index),
      field,
      message: message.into(),
    }
  }
}

impl fmt::Display for FieldError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.question {
      Some(index) => write!(f, "question {index}: {}: {}", self.field, self.message),
      None => write!(f, "{}: {}", self.field, self.message),
    }
  }
}

/// Errors that can occur while compiling or validating a survey.
#[derive(Debug, Error)]
pub enum CompileError {
  /// One or more fields of the draft are malformed.
  #[error("draft has {} structural error(s): {}", .0.len(), join(.0))]
  Structural(Vec<FieldError>),

  /// The draft's flow graph is not well formed.
  #[error("invalid flow: {0}")]
  InvalidFlow(ValidationReport<usize>),

  /// The survey does not exist.
  #[error("survey not found: {0}")]
  SurveyNotFound(SurveyId),

  /// The replace failed inside its transaction and was rolled back.
  #[error("transaction aborted, no changes were applied")]
  TransactionAborted {
    #[source]
    source: surveyflow_store::Error,
  },

  /// Reading the survey failed.
  #[error("storage error: {0}")]
  Store(#[from] surveyflow_store::Error),
}

fn join(errors: &[FieldError]) -> String {
  errors
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}
