use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use surveyflow_config::QuestionKind;
use surveyflow_graph::{Determinant, FlowGraph, FlowNode, QuestionId};

use crate::Error;

/// Identifier of a stored survey.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct SurveyId(pub i64);

impl fmt::Display for SurveyId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Identifier of a stored response.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ResponseId(pub i64);

impl fmt::Display for ResponseId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Status of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ResponseStatus {
  InProgress,
  Completed,
}

/// A survey as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Survey {
  pub survey_id: SurveyId,
  pub title: String,
  pub description: Option<String>,
  pub is_active: bool,
  /// Incremented every time the question set is replaced.
  pub flow_version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A persisted question with its resolved determinants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
  pub question_id: QuestionId,
  pub survey_id: SurveyId,
  pub position: usize,
  pub text: String,
  pub kind: QuestionKind,
  pub is_required: bool,
  pub options: Vec<String>,
  pub default_next: Determinant<QuestionId>,
  pub option_next: BTreeMap<usize, Determinant<QuestionId>>,
}

impl Question {
  pub fn flow_node(&self) -> FlowNode<QuestionId> {
    FlowNode {
      key: self.question_id,
      kind: self.kind,
      option_count: self.options.len(),
      default: self.default_next,
      overrides: self.option_next.clone(),
    }
  }
}

/// Build the persisted flow graph from questions sorted by position.
pub fn flow_graph(questions: &[Question]) -> FlowGraph<QuestionId> {
  FlowGraph::new(questions.iter().map(Question::flow_node).collect())
}

#[derive(FromRow)]
pub(crate) struct QuestionRow {
  pub question_id: i64,
  pub survey_id: SurveyId,
  pub position: i64,
  pub text: String,
  pub kind: String,
  pub is_required: bool,
  pub options: Json<Vec<String>>,
  pub default_next: Json<Determinant<QuestionId>>,
  pub option_next: Json<BTreeMap<usize, Determinant<QuestionId>>>,
}

impl TryFrom<QuestionRow> for Question {
  type Error = Error;

  fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
    let kind = row
      .kind
      .parse::<QuestionKind>()
      .map_err(|e| Error::Corrupt(format!("question {}: {e}", row.question_id)))?;
    let position = usize::try_from(row.position).map_err(|_| {
      Error::Corrupt(format!(
        "question {}: negative position {}",
        row.question_id, row.position
      ))
    })?;

    Ok(Question {
      question_id: QuestionId(row.question_id),
      survey_id: row.survey_id,
      position,
      text: row.text,
      kind,
      is_required: row.is_required,
      options: row.options.0,
      default_next: row.default_next.0,
      option_next: row.option_next.0,
    })
  }
}

/// A response (one respondent walking one survey).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Response {
  pub response_id: ResponseId,
  pub survey_id: SurveyId,
  pub respondent: String,
  pub status: ResponseStatus,
  /// Flow version of the survey when the response started.
  pub flow_version: i64,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl Response {
  pub fn is_complete(&self) -> bool {
    self.status == ResponseStatus::Completed
  }
}

/// The content a respondent submitted for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerValue {
  /// Free text, also used for number, date and location questions.
  Text { text: String },
  /// Selected option indexes.
  Choice { selected: Vec<usize> },
  /// A value on the rating scale.
  Rating { value: u8 },
}

/// An answer to be recorded, with the step it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnswer {
  pub response_id: ResponseId,
  pub question_id: QuestionId,
  pub value: AnswerValue,
  /// Either `GoToQuestion` or `EndSurvey`; never `Sequential`.
  pub next_step: Determinant<QuestionId>,
  pub flow_version: i64,
}

/// A recorded answer. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
  pub answer_id: i64,
  pub response_id: ResponseId,
  pub question_id: QuestionId,
  pub value: AnswerValue,
  pub next_step: Determinant<QuestionId>,
  pub flow_version: i64,
  pub answered_at: DateTime<Utc>,
}

#[derive(FromRow)]
pub(crate) struct AnswerRow {
  pub answer_id: i64,
  pub response_id: ResponseId,
  pub question_id: i64,
  pub value: Json<AnswerValue>,
  pub next_step: Json<Determinant<QuestionId>>,
  pub flow_version: i64,
  pub answered_at: DateTime<Utc>,
}

impl From<AnswerRow> for Answer {
  fn from(row: AnswerRow) -> Self {
    Answer {
      answer_id: row.answer_id,
      response_id: row.response_id,
      question_id: QuestionId(row.question_id),
      value: row.value.0,
      next_step: row.next_step.0,
      flow_version: row.flow_version,
      answered_at: row.answered_at,
    }
  }
}

/// Result of atomically replacing a survey's questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replacement {
  pub flow_version: i64,
  pub questions: Vec<Question>,
}
