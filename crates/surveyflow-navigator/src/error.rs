//! Navigation errors.

use surveyflow_graph::QuestionId;

/// Errors that can occur while walking a survey.
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
  /// Survey, response or question missing.
  #[error("not found: {0}")]
  NotFound(String),

  /// The operation does not apply to the response in its current state.
  #[error("invalid state: {0}")]
  InvalidState(String),

  /// A stored determinant names a question that no longer exists.
  #[error("question {question} leads to question {target}, which is not part of the survey")]
  FlowReference {
    question: QuestionId,
    target: QuestionId,
  },

  /// The answer does not fit the question.
  #[error("invalid answer for question {question}: {message}")]
  InvalidAnswer {
    question: QuestionId,
    message: String,
  },

  /// Storage failed.
  #[error("storage error")]
  Store(#[source] surveyflow_store::Error),
}

impl From<surveyflow_store::Error> for NavigationError {
  fn from(err: surveyflow_store::Error) -> Self {
    match err {
      surveyflow_store::Error::NotFound(what) => NavigationError::NotFound(what),
      surveyflow_store::Error::Conflict(what) => NavigationError::InvalidState(what),
      other => NavigationError::Store(other),
    }
  }
}

impl NavigationError {
  /// Message safe to show a respondent. Never contains identifiers.
  pub fn public_message(&self) -> &'static str {
    match self {
      NavigationError::InvalidAnswer { .. } => {
        "That answer could not be accepted. Please check it and try again."
      }
      NavigationError::InvalidState(_) => {
        "This survey can no longer be answered here. Please start the survey again."
      }
      NavigationError::NotFound(_)
      | NavigationError::FlowReference { .. }
      | NavigationError::Store(_) => {
        "Something went wrong while saving your answer. Please try again in a moment."
      }
    }
  }
}
