use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use surveyflow_graph::{Determinant, QuestionId};
use surveyflow_store::{
  Answer, AnswerValue, NewAnswer, Question, Response, ResponseId, Store, SurveyId, flow_graph,
};
use tracing::{info, instrument, warn};

use crate::error::NavigationError;
use crate::resolution::{resolve, validate_answer};

/// A respondent's answer to the question they were shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveNext {
  pub response_id: ResponseId,
  pub current_question_id: QuestionId,
  pub answer: AnswerValue,
}

/// What the respondent sees next.
///
/// Serializes as `{"next_question_id": 12}` or `{"complete": true}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
  Question(QuestionId),
  Complete,
}

impl NextStep {
  pub fn is_complete(&self) -> bool {
    matches!(self, NextStep::Complete)
  }
}

impl Serialize for NextStep {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    match self {
      NextStep::Question(id) => map.serialize_entry("next_question_id", id)?,
      NextStep::Complete => map.serialize_entry("complete", &true)?,
    }
    map.end()
  }
}

/// A freshly started response and the question to show first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedResponse {
  pub response: Response,
  pub first_question: Question,
}

/// Walks respondents through a survey's persisted flow graph.
pub struct Navigator<S: Store> {
  store: S,
}

impl<S: Store> Navigator<S> {
  pub fn new(store: S) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Start a response on an active survey with at least one question.
  #[instrument(name = "start_response", skip(self), fields(survey_id = %survey_id))]
  pub async fn start_response(
    &self,
    survey_id: SurveyId,
    respondent: &str,
  ) -> Result<StartedResponse, NavigationError> {
    let survey = self.store.get_survey(survey_id).await?;
    if !survey.is_active {
      return Err(NavigationError::InvalidState(format!(
        "survey {survey_id} is not active"
      )));
    }

    let first_question = self
      .store
      .list_questions(survey_id)
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| {
        NavigationError::InvalidState(format!("survey {survey_id} has no questions"))
      })?;

    let response = self.store.create_response(survey_id, respondent).await?;
    info!(
      response_id = %response.response_id,
      flow_version = response.flow_version,
      "response_started"
    );

    Ok(StartedResponse {
      response,
      first_question,
    })
  }

  /// Record the answer to the current question and decide what follows.
  ///
  /// This process:
  /// 1. Rejects completed responses and questions asked out of turn
  /// 2. Checks the answer against the question kind
  /// 3. Resolves the next step from the persisted flow graph
  /// 4. Stamps the resolved step onto the answer, completing the response
  ///    in the same write when the step ends the survey
  ///
  /// Nothing is written when any step fails.
  #[instrument(
    name = "resolve_next",
    skip(self, request),
    fields(
      response_id = %request.response_id,
      question_id = %request.current_question_id,
    )
  )]
  pub async fn resolve_next(&self, request: ResolveNext) -> Result<NextStep, NavigationError> {
    let response = self.store.get_response(request.response_id).await?;
    if response.is_complete() {
      return Err(NavigationError::InvalidState(format!(
        "response {} is already complete",
        response.response_id
      )));
    }

    let questions = self.store.list_questions(response.survey_id).await?;
    let question = questions
      .iter()
      .find(|q| q.question_id == request.current_question_id)
      .ok_or_else(|| {
        NavigationError::NotFound(format!(
          "question {} in survey {}",
          request.current_question_id, response.survey_id
        ))
      })?;

    let answers = self.store.list_answers(response.response_id).await?;
    if answers
      .iter()
      .any(|a| a.question_id == question.question_id)
    {
      return Err(NavigationError::InvalidState(format!(
        "question {} was already answered",
        question.question_id
      )));
    }
    let expected = match answers.last() {
      Some(last) => last.next_step.target().copied(),
      None => questions.first().map(|q| q.question_id),
    };
    if expected != Some(question.question_id) {
      return Err(NavigationError::InvalidState(format!(
        "question {} is not the current question of response {}",
        question.question_id, response.response_id
      )));
    }

    validate_answer(question, &request.answer)?;

    let graph = flow_graph(&questions);
    let resolution = match resolve(&graph, question.question_id, &request.answer) {
      Ok(resolution) => resolution,
      Err(e) => {
        warn!(error = %e, "resolve_failed");
        return Err(e);
      }
    };

    let completes = resolution.is_end();
    let answer = self
      .store
      .record_answer(
        &NewAnswer {
          response_id: response.response_id,
          question_id: question.question_id,
          value: request.answer,
          next_step: resolution.next,
          flow_version: response.flow_version,
        },
        completes,
      )
      .await?;

    info!(answer_id = answer.answer_id, followed = ?resolution.followed, "answer_recorded");

    match resolution.next {
      Determinant::GoToQuestion { target } => Ok(NextStep::Question(target)),
      _ => {
        info!(answers = answers.len() + 1, "response_completed");
        Ok(NextStep::Complete)
      }
    }
  }

  /// Answers of a response in submission order, with the step each one
  /// resolved to.
  pub async fn history(&self, response_id: ResponseId) -> Result<Vec<Answer>, NavigationError> {
    self.store.get_response(response_id).await?;
    Ok(self.store.list_answers(response_id).await?)
  }
}
