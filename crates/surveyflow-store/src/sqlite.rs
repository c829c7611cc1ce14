use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool, Transaction};
use surveyflow_config::DraftQuestion;
use surveyflow_graph::{Determinant, FlowGraph, GraphError, QuestionId};
use tracing::{debug, info};

use crate::types::{AnswerRow, QuestionRow};
use crate::{
  Answer, Error, NewAnswer, Question, Replacement, Response, ResponseId, ResponseStatus, Store,
  Survey, SurveyId,
};

/// Connection settings for [`SqliteStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
  /// SQLite URL, e.g. `sqlite:///home/me/.surveyflow/surveyflow.db`.
  pub database_url: String,
  pub max_connections: u32,
}

impl StoreConfig {
  /// A private in-memory database on a single connection.
  pub fn in_memory() -> Self {
    Self {
      database_url: "sqlite::memory:".to_string(),
      max_connections: 1,
    }
  }
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      database_url: "sqlite://surveyflow.db".to_string(),
      max_connections: 5,
    }
  }
}

/// SQLite-based store implementation.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open a pool for `config`, creating the database file if needed.
  pub async fn connect(config: &StoreConfig) -> Result<Self, Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
      .create_if_missing(true)
      .foreign_keys(true);

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
    if config.database_url.contains(":memory:") {
      // Closing the last connection would drop the database
      pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }

    let pool = pool_options.connect_with(options).await?;
    Ok(Self::new(pool))
  }

  /// In-memory store with migrations applied.
  pub async fn in_memory() -> Result<Self, Error> {
    let store = Self::connect(&StoreConfig::in_memory()).await?;
    store
      .migrate()
      .await
      .map_err(|e| Error::Database(e.into()))?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }

  async fn fetch_questions(
    tx: &mut Transaction<'_, Sqlite>,
    survey_id: SurveyId,
  ) -> Result<Vec<Question>, Error> {
    let rows: Vec<QuestionRow> = sqlx::query_as(
      r#"
            SELECT question_id, survey_id, position, text, kind, is_required, options, default_next, option_next
            FROM questions
            WHERE survey_id = ?
            ORDER BY position ASC
            "#,
    )
    .bind(survey_id)
    .fetch_all(&mut **tx)
    .await?;

    rows.into_iter().map(Question::try_from).collect()
  }
}

fn classify(err: sqlx::Error, what: &str) -> Error {
  if let sqlx::Error::Database(db) = &err {
    if db.is_unique_violation() {
      return Error::Conflict(format!("{what} already exists"));
    }
    if db.is_foreign_key_violation() {
      return Error::NotFound(format!("{what} references a missing record"));
    }
  }
  Error::Database(err)
}

#[async_trait]
impl Store for SqliteStore {
  async fn create_survey(&self, title: &str, description: Option<&str>) -> Result<Survey, Error> {
    let now = Utc::now();
    let result = sqlx::query(
      r#"
            INSERT INTO surveys (title, description, is_active, flow_version, created_at, updated_at)
            VALUES (?, ?, 1, 0, ?, ?)
            "#,
    )
    .bind(title)
    .bind(description)
    .bind(now)
    .bind(now)
    .execute(&self.pool)
    .await?;

    self.get_survey(SurveyId(result.last_insert_rowid())).await
  }

  async fn get_survey(&self, survey_id: SurveyId) -> Result<Survey, Error> {
    sqlx::query_as(
      r#"
            SELECT survey_id, title, description, is_active, flow_version, created_at, updated_at
            FROM surveys
            WHERE survey_id = ?
            "#,
    )
    .bind(survey_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("survey {survey_id}")))
  }

  async fn list_surveys(&self) -> Result<Vec<Survey>, Error> {
    let surveys = sqlx::query_as(
      r#"
            SELECT survey_id, title, description, is_active, flow_version, created_at, updated_at
            FROM surveys
            ORDER BY survey_id DESC
            "#,
    )
    .fetch_all(&self.pool)
    .await?;

    Ok(surveys)
  }

  async fn set_survey_active(&self, survey_id: SurveyId, is_active: bool) -> Result<(), Error> {
    let result = sqlx::query(
      r#"
            UPDATE surveys
            SET is_active = ?, updated_at = ?
            WHERE survey_id = ?
            "#,
    )
    .bind(is_active)
    .bind(Utc::now())
    .bind(survey_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("survey {survey_id}")));
    }
    Ok(())
  }

  async fn list_questions(&self, survey_id: SurveyId) -> Result<Vec<Question>, Error> {
    let mut tx = self.pool.begin().await?;
    let questions = Self::fetch_questions(&mut tx, survey_id).await?;
    tx.commit().await?;
    Ok(questions)
  }

  async fn replace_questions<F>(
    &self,
    survey_id: SurveyId,
    questions: &[DraftQuestion],
    translate: F,
  ) -> Result<Replacement, Error>
  where
    F: FnOnce(&[QuestionId]) -> Result<FlowGraph<QuestionId>, GraphError> + Send,
  {
    // Dropping the transaction without commit rolls it back, so every
    // early return below leaves the survey untouched.
    let mut tx = self.pool.begin().await?;

    // Writing the survey row first takes the database write lock, which
    // serializes concurrent replaces of the same survey.
    let bumped = sqlx::query(
      r#"
            UPDATE surveys
            SET flow_version = flow_version + 1, updated_at = ?
            WHERE survey_id = ?
            "#,
    )
    .bind(Utc::now())
    .bind(survey_id)
    .execute(&mut *tx)
    .await?;
    if bumped.rows_affected() == 0 {
      return Err(Error::NotFound(format!("survey {survey_id}")));
    }

    let responses = sqlx::query("DELETE FROM responses WHERE survey_id = ?")
      .bind(survey_id)
      .execute(&mut *tx)
      .await?;
    let removed = sqlx::query("DELETE FROM questions WHERE survey_id = ?")
      .bind(survey_id)
      .execute(&mut *tx)
      .await?;
    debug!(
      survey_id = %survey_id,
      questions_removed = removed.rows_affected(),
      responses_removed = responses.rows_affected(),
      "cleared previous question set"
    );

    let placeholder_next: Determinant<QuestionId> = Determinant::Sequential;
    let placeholder_overrides: BTreeMap<usize, Determinant<QuestionId>> = BTreeMap::new();
    let mut ids = Vec::with_capacity(questions.len());
    for (position, question) in questions.iter().enumerate() {
      let inserted = sqlx::query(
        r#"
            INSERT INTO questions (survey_id, position, text, kind, is_required, options, default_next, option_next)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
      )
      .bind(survey_id)
      .bind(position as i64)
      .bind(&question.text)
      .bind(question.kind.as_str())
      .bind(question.is_required)
      .bind(Json(&question.options))
      .bind(Json(&placeholder_next))
      .bind(Json(&placeholder_overrides))
      .execute(&mut *tx)
      .await?;
      ids.push(QuestionId(inserted.last_insert_rowid()));
    }

    let graph = translate(&ids)?;
    if graph.len() != ids.len() {
      return Err(Error::Translation(GraphError::MappingLength {
        expected: ids.len(),
        actual: graph.len(),
      }));
    }

    for node in graph.nodes() {
      sqlx::query(
        r#"
            UPDATE questions
            SET default_next = ?, option_next = ?
            WHERE question_id = ? AND survey_id = ?
            "#,
      )
      .bind(Json(&node.default))
      .bind(Json(&node.overrides))
      .bind(node.key.0)
      .bind(survey_id)
      .execute(&mut *tx)
      .await?;
    }

    let flow_version: i64 =
      sqlx::query_scalar("SELECT flow_version FROM surveys WHERE survey_id = ?")
        .bind(survey_id)
        .fetch_one(&mut *tx)
        .await?;
    let questions = Self::fetch_questions(&mut tx, survey_id).await?;

    tx.commit().await?;

    info!(
      survey_id = %survey_id,
      flow_version,
      question_count = questions.len(),
      "questions_replaced"
    );

    Ok(Replacement {
      flow_version,
      questions,
    })
  }

  async fn create_response(
    &self,
    survey_id: SurveyId,
    respondent: &str,
  ) -> Result<Response, Error> {
    let result = sqlx::query(
      r#"
            INSERT INTO responses (survey_id, respondent, status, flow_version, started_at, completed_at)
            SELECT survey_id, ?, ?, flow_version, ?, NULL
            FROM surveys
            WHERE survey_id = ?
            "#,
    )
    .bind(respondent)
    .bind(ResponseStatus::InProgress)
    .bind(Utc::now())
    .bind(survey_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("survey {survey_id}")));
    }

    self
      .get_response(ResponseId(result.last_insert_rowid()))
      .await
  }

  async fn get_response(&self, response_id: ResponseId) -> Result<Response, Error> {
    sqlx::query_as(
      r#"
            SELECT response_id, survey_id, respondent, status, flow_version, started_at, completed_at
            FROM responses
            WHERE response_id = ?
            "#,
    )
    .bind(response_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("response {response_id}")))
  }

  async fn record_answer(&self, answer: &NewAnswer, completes: bool) -> Result<Answer, Error> {
    let mut tx = self.pool.begin().await?;

    let status: Option<ResponseStatus> =
      sqlx::query_scalar("SELECT status FROM responses WHERE response_id = ?")
        .bind(answer.response_id)
        .fetch_optional(&mut *tx)
        .await?;
    match status {
      None => {
        return Err(Error::NotFound(format!(
          "response {}",
          answer.response_id
        )));
      }
      Some(ResponseStatus::Completed) => {
        return Err(Error::Conflict(format!(
          "response {} is already complete",
          answer.response_id
        )));
      }
      Some(ResponseStatus::InProgress) => {}
    }

    let answered_at = Utc::now();
    let inserted = sqlx::query(
      r#"
            INSERT INTO answers (response_id, question_id, value, next_step, flow_version, answered_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(answer.response_id)
    .bind(answer.question_id.0)
    .bind(Json(&answer.value))
    .bind(Json(&answer.next_step))
    .bind(answer.flow_version)
    .bind(answered_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
      classify(
        e,
        &format!(
          "answer for question {} in response {}",
          answer.question_id, answer.response_id
        ),
      )
    })?;

    if completes {
      sqlx::query(
        r#"
            UPDATE responses
            SET status = ?, completed_at = ?
            WHERE response_id = ?
            "#,
      )
      .bind(ResponseStatus::Completed)
      .bind(answered_at)
      .bind(answer.response_id)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;

    Ok(Answer {
      answer_id: inserted.last_insert_rowid(),
      response_id: answer.response_id,
      question_id: answer.question_id,
      value: answer.value.clone(),
      next_step: answer.next_step,
      flow_version: answer.flow_version,
      answered_at,
    })
  }

  async fn list_answers(&self, response_id: ResponseId) -> Result<Vec<Answer>, Error> {
    let rows: Vec<AnswerRow> = sqlx::query_as(
      r#"
            SELECT answer_id, response_id, question_id, value, next_step, flow_version, answered_at
            FROM answers
            WHERE response_id = ?
            ORDER BY answer_id ASC
            "#,
    )
    .bind(response_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows.into_iter().map(Answer::from).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::AnswerValue;
  use surveyflow_config::{DraftTarget, QuestionKind};

  fn drafts() -> Vec<DraftQuestion> {
    vec![
      DraftQuestion::new("Name?", QuestionKind::Text),
      DraftQuestion::new("Continue?", QuestionKind::SingleChoice)
        .with_options(["A", "B"])
        .with_option_next(0, DraftTarget::End)
        .with_option_next(1, DraftTarget::Question(2)),
      DraftQuestion::new("Rate us", QuestionKind::Rating).with_default_next(DraftTarget::End),
    ]
  }

  async fn seeded() -> (SqliteStore, Survey, Replacement) {
    let store = SqliteStore::in_memory().await.unwrap();
    let survey = store.create_survey("Feedback", None).await.unwrap();
    let questions = drafts();
    let replacement = store
      .replace_questions(survey.survey_id, &questions, |ids| {
        FlowGraph::from_draft(&questions).to_persisted(ids)
      })
      .await
      .unwrap();
    (store, survey, replacement)
  }

  #[tokio::test]
  async fn test_create_and_get_survey() {
    let store = SqliteStore::in_memory().await.unwrap();
    let created = store
      .create_survey("Onboarding", Some("first week"))
      .await
      .unwrap();

    let fetched = store.get_survey(created.survey_id).await.unwrap();
    assert_eq!(fetched.title, "Onboarding");
    assert_eq!(fetched.description.as_deref(), Some("first week"));
    assert!(fetched.is_active);
    assert_eq!(fetched.flow_version, 0);

    store
      .set_survey_active(created.survey_id, false)
      .await
      .unwrap();
    assert!(!store.get_survey(created.survey_id).await.unwrap().is_active);
    assert_eq!(store.list_surveys().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_get_missing_survey() {
    let store = SqliteStore::in_memory().await.unwrap();
    let err = store.get_survey(SurveyId(42)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn test_replace_writes_translated_determinants() {
    let (store, survey, replacement) = seeded().await;
    assert_eq!(replacement.flow_version, 1);

    let questions = store.list_questions(survey.survey_id).await.unwrap();
    assert_eq!(questions, replacement.questions);
    assert_eq!(questions.len(), 3);
    assert_eq!(
      questions.iter().map(|q| q.position).collect::<Vec<_>>(),
      vec![0, 1, 2]
    );

    let q2 = questions[2].question_id;
    assert_eq!(questions[0].default_next, Determinant::Sequential);
    assert_eq!(questions[1].option_next[&0], Determinant::EndSurvey);
    assert_eq!(questions[1].option_next[&1], Determinant::go_to(q2));
    assert_eq!(questions[2].default_next, Determinant::EndSurvey);
    assert_eq!(questions[1].options, vec!["A".to_string(), "B".to_string()]);
  }

  #[tokio::test]
  async fn test_replace_missing_survey() {
    let store = SqliteStore::in_memory().await.unwrap();
    let questions = drafts();
    let err = store
      .replace_questions(SurveyId(7), &questions, |ids| {
        FlowGraph::from_draft(&questions).to_persisted(ids)
      })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn test_replace_removes_responses_and_answers() {
    let (store, survey, replacement) = seeded().await;
    let response = store
      .create_response(survey.survey_id, "alice")
      .await
      .unwrap();
    store
      .record_answer(
        &NewAnswer {
          response_id: response.response_id,
          question_id: replacement.questions[0].question_id,
          value: AnswerValue::Text {
            text: "Alice".to_string(),
          },
          next_step: Determinant::go_to(replacement.questions[1].question_id),
          flow_version: replacement.flow_version,
        },
        false,
      )
      .await
      .unwrap();

    let questions = drafts();
    let second = store
      .replace_questions(survey.survey_id, &questions, |ids| {
        FlowGraph::from_draft(&questions).to_persisted(ids)
      })
      .await
      .unwrap();

    assert_eq!(second.flow_version, 2);
    assert!(matches!(
      store.get_response(response.response_id).await,
      Err(Error::NotFound(_))
    ));
    assert!(
      store
        .list_answers(response.response_id)
        .await
        .unwrap()
        .is_empty()
    );
    // Ids are never reused across replaces
    assert!(second.questions[0].question_id > replacement.questions[2].question_id);
  }

  #[tokio::test]
  async fn test_failed_translation_rolls_back() {
    let (store, survey, original) = seeded().await;
    let response = store
      .create_response(survey.survey_id, "bob")
      .await
      .unwrap();

    let replacement = vec![DraftQuestion::new("Only question", QuestionKind::Text)];
    let err = store
      .replace_questions(survey.survey_id, &replacement, |_ids| {
        Err(GraphError::UnmappedIndex {
          question: 0,
          index: 3,
        })
      })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Translation(_)));

    let questions = store.list_questions(survey.survey_id).await.unwrap();
    assert_eq!(questions, original.questions);
    let survey = store.get_survey(survey.survey_id).await.unwrap();
    assert_eq!(survey.flow_version, original.flow_version);
    assert!(store.get_response(response.response_id).await.is_ok());
  }

  #[tokio::test]
  async fn test_record_answer_and_complete() {
    let (store, survey, replacement) = seeded().await;
    let response = store
      .create_response(survey.survey_id, "carol")
      .await
      .unwrap();
    assert_eq!(response.status, ResponseStatus::InProgress);
    assert_eq!(response.flow_version, 1);

    let answer = NewAnswer {
      response_id: response.response_id,
      question_id: replacement.questions[1].question_id,
      value: AnswerValue::Choice { selected: vec![0] },
      next_step: Determinant::EndSurvey,
      flow_version: 1,
    };
    let recorded = store.record_answer(&answer, true).await.unwrap();
    assert_eq!(recorded.next_step, Determinant::EndSurvey);

    let response = store.get_response(response.response_id).await.unwrap();
    assert!(response.is_complete());
    assert!(response.completed_at.is_some());

    let history = store.list_answers(response.response_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].answer_id, recorded.answer_id);
    assert_eq!(history[0].value, answer.value);
    assert_eq!(history[0].next_step, Determinant::EndSurvey);

    let err = store.record_answer(&answer, false).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
  }

  #[tokio::test]
  async fn test_duplicate_answer_conflicts() {
    let (store, survey, replacement) = seeded().await;
    let response = store
      .create_response(survey.survey_id, "dave")
      .await
      .unwrap();
    let answer = NewAnswer {
      response_id: response.response_id,
      question_id: replacement.questions[0].question_id,
      value: AnswerValue::Text {
        text: "Dave".to_string(),
      },
      next_step: Determinant::go_to(replacement.questions[1].question_id),
      flow_version: 1,
    };
    store.record_answer(&answer, false).await.unwrap();
    let err = store.record_answer(&answer, false).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
  }

  #[tokio::test]
  async fn test_on_disk_store_persists_across_pools() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
      database_url: format!("sqlite://{}", dir.path().join("flow.db").display()),
      max_connections: 2,
    };

    let survey_id = {
      let store = SqliteStore::connect(&config).await.unwrap();
      store.migrate().await.unwrap();
      let survey = store.create_survey("Persisted", None).await.unwrap();
      store.pool().close().await;
      survey.survey_id
    };

    let store = SqliteStore::connect(&config).await.unwrap();
    store.migrate().await.unwrap();
    assert_eq!(store.get_survey(survey_id).await.unwrap().title, "Persisted");
  }
}
