use serde::{Deserialize, Serialize};

use crate::question::DraftQuestion;

/// A full replacement question list for one survey.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DraftSurvey {
  pub questions: Vec<DraftQuestion>,
}

impl DraftSurvey {
  pub fn new(questions: Vec<DraftQuestion>) -> Self {
    Self { questions }
  }

  pub fn len(&self) -> usize {
    self.questions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.questions.is_empty()
  }
}
