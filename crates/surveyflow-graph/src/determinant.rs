use serde::{Deserialize, Serialize};
use surveyflow_config::DraftTarget;

/// What happens after a question is answered.
///
/// `K` is the identity space the target lives in: a draft position before
/// persistence, a [`QuestionId`](crate::QuestionId) after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Determinant<K> {
  GoToQuestion { target: K },
  EndSurvey,
  Sequential,
}

impl<K> Determinant<K> {
  pub fn go_to(target: K) -> Self {
    Determinant::GoToQuestion { target }
  }

  /// The explicit target, if any.
  pub fn target(&self) -> Option<&K> {
    match self {
      Determinant::GoToQuestion { target } => Some(target),
      _ => None,
    }
  }

  pub fn is_end(&self) -> bool {
    matches!(self, Determinant::EndSurvey)
  }

  /// Rewrite the target into another identity space.
  pub fn try_map<U, E>(self, f: impl FnOnce(K) -> Result<U, E>) -> Result<Determinant<U>, E> {
    Ok(match self {
      Determinant::GoToQuestion { target } => Determinant::GoToQuestion { target: f(target)? },
      Determinant::EndSurvey => Determinant::EndSurvey,
      Determinant::Sequential => Determinant::Sequential,
    })
  }
}

impl From<DraftTarget> for Determinant<usize> {
  fn from(target: DraftTarget) -> Self {
    match target {
      DraftTarget::Sequential => Determinant::Sequential,
      DraftTarget::End => Determinant::EndSurvey,
      DraftTarget::Question(index) => Determinant::GoToQuestion { target: index },
    }
  }
}
