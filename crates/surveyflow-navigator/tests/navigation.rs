//! Answer-time navigation against compiled surveys in an in-memory store.

use std::collections::BTreeMap;

use surveyflow_compiler::{Compiler, CompilerConfig, StandardCompiler};
use surveyflow_config::{DraftQuestion, DraftSurvey, DraftTarget, QuestionKind};
use surveyflow_graph::{Determinant, FlowGraph, FlowNode, QuestionId};
use surveyflow_navigator::{AnswerValue, NavigationError, Navigator, NextStep, ResolveNext};
use surveyflow_store::{Question, ResponseStatus, SqliteStore, Store, SurveyId};

/// Q0 text (sequential), Q1 single choice {A: end, B: sequential},
/// Q2 rating (end).
fn branching_draft() -> DraftSurvey {
  DraftSurvey::new(vec![
    DraftQuestion::new("What is your name?", QuestionKind::Text),
    DraftQuestion::new("Pick one", QuestionKind::SingleChoice)
      .with_options(["A", "B"])
      .with_option_next(0, DraftTarget::End)
      .with_option_next(1, DraftTarget::Sequential),
    DraftQuestion::new("Rate us", QuestionKind::Rating).with_default_next(DraftTarget::End),
  ])
}

async fn setup() -> (Navigator<SqliteStore>, SurveyId, Vec<Question>) {
  let store = SqliteStore::in_memory().await.unwrap();
  let survey = store.create_survey("Branching", None).await.unwrap();
  let compiler = StandardCompiler::new(store.clone(), CompilerConfig::default());
  let compiled = compiler
    .compile(survey.survey_id, branching_draft())
    .await
    .unwrap();
  (Navigator::new(store), survey.survey_id, compiled.questions)
}

fn text(value: &str) -> AnswerValue {
  AnswerValue::Text {
    text: value.to_string(),
  }
}

fn choice(option: usize) -> AnswerValue {
  AnswerValue::Choice {
    selected: vec![option],
  }
}

#[tokio::test]
async fn test_option_a_completes_the_survey() {
  let (navigator, survey_id, questions) = setup().await;
  let started = navigator.start_response(survey_id, "alice").await.unwrap();
  let response_id = started.response.response_id;
  assert_eq!(started.first_question.question_id, questions[0].question_id);

  let next = navigator
    .resolve_next(ResolveNext {
      response_id,
      current_question_id: questions[0].question_id,
      answer: text("Alice"),
    })
    .await
    .unwrap();
  assert_eq!(next, NextStep::Question(questions[1].question_id));

  let next = navigator
    .resolve_next(ResolveNext {
      response_id,
      current_question_id: questions[1].question_id,
      answer: choice(0),
    })
    .await
    .unwrap();
  assert_eq!(next, NextStep::Complete);

  let response = navigator.store().get_response(response_id).await.unwrap();
  assert_eq!(response.status, ResponseStatus::Completed);
  assert!(response.completed_at.is_some());

  let history = navigator.history(response_id).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(
    history[0].next_step,
    Determinant::go_to(questions[1].question_id)
  );
  assert_eq!(history[1].next_step, Determinant::EndSurvey);
  assert!(history.iter().all(|a| a.flow_version == 1));
}

#[tokio::test]
async fn test_option_b_continues_to_rating() {
  let (navigator, survey_id, questions) = setup().await;
  let response_id = navigator
    .start_response(survey_id, "bob")
    .await
    .unwrap()
    .response
    .response_id;

  navigator
    .resolve_next(ResolveNext {
      response_id,
      current_question_id: questions[0].question_id,
      answer: text("Bob"),
    })
    .await
    .unwrap();
  let next = navigator
    .resolve_next(ResolveNext {
      response_id,
      current_question_id: questions[1].question_id,
      answer: choice(1),
    })
    .await
    .unwrap();
  assert_eq!(next, NextStep::Question(questions[2].question_id));

  let next = navigator
    .resolve_next(ResolveNext {
      response_id,
      current_question_id: questions[2].question_id,
      answer: AnswerValue::Rating { value: 4 },
    })
    .await
    .unwrap();
  assert!(next.is_complete());
}

#[tokio::test]
async fn test_completed_response_rejects_answers() {
  let (navigator, survey_id, questions) = setup().await;
  let response_id = navigator
    .start_response(survey_id, "carol")
    .await
    .unwrap()
    .response
    .response_id;

  for (question, answer) in [(&questions[0], text("Carol")), (&questions[1], choice(0))] {
    navigator
      .resolve_next(ResolveNext {
        response_id,
        current_question_id: question.question_id,
        answer,
      })
      .await
      .unwrap();
  }

  let err = navigator
    .resolve_next(ResolveNext {
      response_id,
      current_question_id: questions[2].question_id,
      answer: AnswerValue::Rating { value: 2 },
    })
    .await
    .unwrap_err();
  assert!(matches!(err, NavigationError::InvalidState(_)));
  assert_eq!(navigator.history(response_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_out_of_turn_and_repeated_answers_rejected() {
  let (navigator, survey_id, questions) = setup().await;
  let response_id = navigator
    .start_response(survey_id, "dave")
    .await
    .unwrap()
    .response
    .response_id;

  let skipped = navigator
    .resolve_next(ResolveNext {
      response_id,
      current_question_id: questions[1].question_id,
      answer: choice(1),
    })
    .await
    .unwrap_err();
  assert!(matches!(skipped, NavigationError::InvalidState(_)));

  let first = ResolveNext {
    response_id,
    current_question_id: questions[0].question_id,
    answer: text("Dave"),
  };
  navigator.resolve_next(first.clone()).await.unwrap();
  let repeated = navigator.resolve_next(first).await.unwrap_err();
  assert!(matches!(repeated, NavigationError::InvalidState(_)));
}

#[tokio::test]
async fn test_invalid_answer_leaves_response_untouched() {
  let (navigator, survey_id, questions) = setup().await;
  let response_id = navigator
    .start_response(survey_id, "erin")
    .await
    .unwrap()
    .response
    .response_id;

  let err = navigator
    .resolve_next(ResolveNext {
      response_id,
      current_question_id: questions[0].question_id,
      answer: choice(0),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, NavigationError::InvalidAnswer { .. }));
  assert!(navigator.history(response_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dangling_determinant_is_flow_reference_error() {
  let store = SqliteStore::in_memory().await.unwrap();
  let survey = store.create_survey("Broken", None).await.unwrap();
  let draft = vec![
    DraftQuestion::new("First", QuestionKind::Text),
    DraftQuestion::new("Second", QuestionKind::Text).with_default_next(DraftTarget::End),
  ];
  // Write a determinant pointing outside the survey, as an out-of-band
  // edit would.
  store
    .replace_questions(survey.survey_id, &draft, |ids| {
      Ok(FlowGraph::new(vec![
        FlowNode {
          key: ids[0],
          kind: QuestionKind::Text,
          option_count: 0,
          default: Determinant::go_to(QuestionId(9_999)),
          overrides: BTreeMap::new(),
        },
        FlowNode {
          key: ids[1],
          kind: QuestionKind::Text,
          option_count: 0,
          default: Determinant::EndSurvey,
          overrides: BTreeMap::new(),
        },
      ]))
    })
    .await
    .unwrap();

  let navigator = Navigator::new(store);
  let started = navigator
    .start_response(survey.survey_id, "frank")
    .await
    .unwrap();
  let response_id = started.response.response_id;

  let err = navigator
    .resolve_next(ResolveNext {
      response_id,
      current_question_id: started.first_question.question_id,
      answer: text("hello"),
    })
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    NavigationError::FlowReference {
      target: QuestionId(9_999),
      ..
    }
  ));

  let response = navigator.store().get_response(response_id).await.unwrap();
  assert_eq!(response.status, ResponseStatus::InProgress);
  assert!(navigator.history(response_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_start_requires_active_survey_with_questions() {
  let store = SqliteStore::in_memory().await.unwrap();
  let empty = store.create_survey("Empty", None).await.unwrap();
  let navigator = Navigator::new(store);

  let err = navigator
    .start_response(empty.survey_id, "gina")
    .await
    .unwrap_err();
  assert!(matches!(err, NavigationError::InvalidState(_)));

  let compiler = StandardCompiler::new(navigator.store().clone(), CompilerConfig::default());
  compiler
    .compile(empty.survey_id, branching_draft())
    .await
    .unwrap();
  navigator
    .store()
    .set_survey_active(empty.survey_id, false)
    .await
    .unwrap();

  let err = navigator
    .start_response(empty.survey_id, "gina")
    .await
    .unwrap_err();
  assert!(matches!(err, NavigationError::InvalidState(_)));

  let err = navigator
    .start_response(SurveyId(404), "gina")
    .await
    .unwrap_err();
  assert!(matches!(err, NavigationError::NotFound(_)));
}

#[tokio::test]
async fn test_recompile_removes_in_flight_response() {
  let (navigator, survey_id, questions) = setup().await;
  let response_id = navigator
    .start_response(survey_id, "hank")
    .await
    .unwrap()
    .response
    .response_id;

  let compiler = StandardCompiler::new(navigator.store().clone(), CompilerConfig::default());
  compiler
    .compile(survey_id, branching_draft())
    .await
    .unwrap();

  let err = navigator
    .resolve_next(ResolveNext {
      response_id,
      current_question_id: questions[0].question_id,
      answer: text("Hank"),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, NavigationError::NotFound(_)));
}
