//! Surveyflow Store
//!
//! This crate provides the storage trait and implementations for surveys,
//! their questions, responses and answers. Data is persisted to SQLite.
//!
//! The [`Store`] trait defines operations for:
//! - Creating and looking up surveys
//! - Atomically replacing a survey's question set and flow graph
//! - Starting responses and recording answers with the step they resolved to
//! - Querying response history

mod sqlite;
mod types;

pub use sqlite::{SqliteStore, StoreConfig};
pub use types::{
  Answer, AnswerValue, NewAnswer, Question, Replacement, Response, ResponseId, ResponseStatus,
  Survey, SurveyId, flow_graph,
};

use async_trait::async_trait;
use surveyflow_config::DraftQuestion;
use surveyflow_graph::{FlowGraph, GraphError, QuestionId};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// The write conflicts with existing state.
  #[error("conflict: {0}")]
  Conflict(String),

  /// A stored row could not be decoded.
  #[error("corrupt record: {0}")]
  Corrupt(String),

  /// Draft references could not be rewritten into persisted ids.
  #[error("flow translation failed: {0}")]
  Translation(#[from] GraphError),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// Storage trait for surveys, questions, responses and answers.
#[async_trait]
pub trait Store: Send + Sync {
  /// Create a new, active survey with no questions.
  async fn create_survey(&self, title: &str, description: Option<&str>) -> Result<Survey, Error>;

  /// Get a survey by ID.
  async fn get_survey(&self, survey_id: SurveyId) -> Result<Survey, Error>;

  /// List all surveys, newest first.
  async fn list_surveys(&self) -> Result<Vec<Survey>, Error>;

  /// Activate or deactivate a survey.
  async fn set_survey_active(&self, survey_id: SurveyId, is_active: bool) -> Result<(), Error>;

  /// List a survey's questions in order position.
  async fn list_questions(&self, survey_id: SurveyId) -> Result<Vec<Question>, Error>;

  /// Replace every question of a survey in one transaction.
  ///
  /// Existing questions are deleted along with every response and answer
  /// of the survey. The new questions are inserted in draft order, then
  /// `translate` receives the ids assigned to each draft position and
  /// returns the persisted flow graph, whose determinants are written
  /// back onto the rows. Any error rolls the whole replace back.
  async fn replace_questions<F>(
    &self,
    survey_id: SurveyId,
    questions: &[DraftQuestion],
    translate: F,
  ) -> Result<Replacement, Error>
  where
    F: FnOnce(&[QuestionId]) -> Result<FlowGraph<QuestionId>, GraphError> + Send;

  /// Start a response against the survey's current flow version.
  async fn create_response(&self, survey_id: SurveyId, respondent: &str)
  -> Result<Response, Error>;

  /// Get a response by ID.
  async fn get_response(&self, response_id: ResponseId) -> Result<Response, Error>;

  /// Record an answer, optionally completing the response in the same
  /// transaction. Fails with [`Error::Conflict`] if the response is
  /// already complete or the question was already answered.
  async fn record_answer(&self, answer: &NewAnswer, completes: bool) -> Result<Answer, Error>;

  /// List the answers of a response in submission order.
  async fn list_answers(&self, response_id: ResponseId) -> Result<Vec<Answer>, Error>;
}
