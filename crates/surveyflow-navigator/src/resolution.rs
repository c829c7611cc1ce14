use chrono::NaiveDate;
use surveyflow_config::{QuestionKind, RATING_MAX, RATING_MIN};
use surveyflow_graph::{Determinant, FlowGraph, FlowNode, QuestionId, Step};
use surveyflow_store::{AnswerValue, Question};

use crate::error::NavigationError;

/// The outcome of resolving one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
  /// The determinant that applied, as stored on the question.
  pub followed: Determinant<QuestionId>,
  /// Where it leads: `GoToQuestion` or `EndSurvey`, never `Sequential`.
  pub next: Determinant<QuestionId>,
}

impl Resolution {
  pub fn is_end(&self) -> bool {
    self.next.is_end()
  }
}

/// Branch slot selected by an answer, if it selects exactly one.
fn branch_slot(kind: QuestionKind, answer: &AnswerValue) -> Option<usize> {
  match (kind, answer) {
    (QuestionKind::SingleChoice, AnswerValue::Choice { selected }) if selected.len() == 1 => {
      Some(selected[0])
    }
    (QuestionKind::Rating, AnswerValue::Rating { value }) if *value >= RATING_MIN => {
      Some(usize::from(value - RATING_MIN))
    }
    _ => None,
  }
}

fn applicable<'a>(
  node: &'a FlowNode<QuestionId>,
  answer: &AnswerValue,
) -> &'a Determinant<QuestionId> {
  if node.kind.supports_branching() {
    if let Some(det) = branch_slot(node.kind, answer).and_then(|slot| node.overrides.get(&slot)) {
      return det;
    }
  }
  &node.default
}

/// Decide what follows `question` given `answer`.
///
/// 1. A branching question whose answer selects exactly one option with an
///    override follows that override.
/// 2. Otherwise the question's default determinant applies.
/// 3. `Sequential` resolves to the next order position, or to the end of
///    the survey after the last question.
pub fn resolve(
  graph: &FlowGraph<QuestionId>,
  question: QuestionId,
  answer: &AnswerValue,
) -> Result<Resolution, NavigationError> {
  let position = graph
    .position_of(&question)
    .ok_or_else(|| NavigationError::NotFound(format!("question {question}")))?;
  let node = &graph.nodes()[position];
  let followed = *applicable(node, answer);

  let next = match graph.step(position, &followed) {
    Step::Question(next) => Determinant::go_to(graph.nodes()[next].key),
    Step::End => Determinant::EndSurvey,
    Step::Dangling(target) => return Err(NavigationError::FlowReference { question, target }),
  };

  Ok(Resolution { followed, next })
}

/// Check that `answer` has the shape `question`'s kind expects.
pub fn validate_answer(question: &Question, answer: &AnswerValue) -> Result<(), NavigationError> {
  let invalid = |message: String| NavigationError::InvalidAnswer {
    question: question.question_id,
    message,
  };
  let kind = question.kind;

  match (kind, answer) {
    (
      QuestionKind::Text | QuestionKind::Number | QuestionKind::Date | QuestionKind::Location,
      AnswerValue::Text { text },
    ) => {
      let text = text.trim();
      if text.is_empty() {
        return if question.is_required {
          Err(invalid("an answer is required".to_string()))
        } else {
          Ok(())
        };
      }
      match kind {
        QuestionKind::Number if !text.parse::<f64>().is_ok_and(f64::is_finite) => {
          Err(invalid(format!("\"{text}\" is not a number")))
        }
        QuestionKind::Date if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_err() => {
          Err(invalid(format!("\"{text}\" is not a YYYY-MM-DD date")))
        }
        QuestionKind::Location if !is_location(text) => {
          Err(invalid(format!("\"{text}\" is not a latitude,longitude pair")))
        }
        _ => Ok(()),
      }
    }
    (
      QuestionKind::SingleChoice | QuestionKind::MultipleChoice,
      AnswerValue::Choice { selected },
    ) => {
      if selected.is_empty() {
        return if question.is_required {
          Err(invalid("an option must be selected".to_string()))
        } else {
          Ok(())
        };
      }
      if kind == QuestionKind::SingleChoice && selected.len() > 1 {
        return Err(invalid("only one option may be selected".to_string()));
      }
      for (i, option) in selected.iter().enumerate() {
        if *option >= question.options.len() {
          return Err(invalid(format!("option {option} does not exist")));
        }
        if selected[..i].contains(option) {
          return Err(invalid(format!("option {option} selected twice")));
        }
      }
      Ok(())
    }
    (QuestionKind::Rating, AnswerValue::Rating { value }) => {
      if (RATING_MIN..=RATING_MAX).contains(value) {
        Ok(())
      } else {
        Err(invalid(format!(
          "rating must be between {RATING_MIN} and {RATING_MAX}, got {value}"
        )))
      }
    }
    _ => Err(invalid(format!("answer does not fit a {kind} question"))),
  }
}

fn is_location(text: &str) -> bool {
  let Some((lat, lon)) = text.split_once(',') else {
    return false;
  };
  match (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
    (Ok(lat), Ok(lon)) => (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon),
    _ => false,
  }
}
