use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surveyflow_config::{CompilerLimits, DraftSurvey};
use surveyflow_graph::{FlowGraph, QuestionId, ValidationReport};
use surveyflow_store::{Question, Store, Survey, SurveyId, flow_graph};
use tracing::{info, instrument, warn};

use crate::error::CompileError;
use crate::locks::SurveyLocks;
use crate::structure::check_structure;

/// Configuration for the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
  #[serde(default)]
  pub limits: CompilerLimits,
}

/// A survey after its question set was replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledSurvey {
  pub survey: Survey,
  pub questions: Vec<Question>,
}

/// Structural pass followed by the graph pass, without touching storage.
///
/// Field errors abort before the graph is built; graph issues come back
/// as an invalid report rather than an error.
pub fn check_draft(
  draft: &DraftSurvey,
  limits: &CompilerLimits,
) -> Result<ValidationReport<usize>, CompileError> {
  let field_errors = check_structure(draft, limits);
  if !field_errors.is_empty() {
    return Err(CompileError::Structural(field_errors));
  }
  Ok(FlowGraph::from_draft(&draft.questions).validate())
}

/// Compiler turns draft question lists into persisted flow graphs.
#[async_trait]
pub trait Compiler: Send + Sync {
  /// Replace a survey's questions with `draft`.
  ///
  /// This process:
  /// 1. Checks every field of the draft (text, options, branch usage)
  /// 2. Builds the draft flow graph and validates it
  /// 3. Deletes the old questions (and every response), inserts the new
  ///    ones and rewrites draft indexes into persisted ids, atomically
  async fn compile(
    &self,
    survey_id: SurveyId,
    draft: DraftSurvey,
  ) -> Result<CompiledSurvey, CompileError>;

  /// Run steps 1 and 2 of [`Compiler::compile`] without touching storage.
  fn check_draft(&self, draft: &DraftSurvey) -> Result<ValidationReport<usize>, CompileError>;

  /// Validate the flow graph currently persisted for a survey.
  async fn validate_survey(
    &self,
    survey_id: SurveyId,
  ) -> Result<ValidationReport<QuestionId>, CompileError>;
}

/// Standard compiler implementation backed by a [`Store`].
pub struct StandardCompiler<S: Store> {
  store: S,
  config: CompilerConfig,
  locks: SurveyLocks,
}

impl<S: Store> StandardCompiler<S> {
  /// Create a new compiler with the given store.
  pub fn new(store: S, config: CompilerConfig) -> Self {
    Self {
      store,
      config,
      locks: SurveyLocks::new(),
    }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Structural pass followed by the graph pass.
  fn build_draft_graph(&self, draft: &DraftSurvey) -> Result<FlowGraph<usize>, CompileError> {
    let field_errors = check_structure(draft, &self.config.limits);
    if !field_errors.is_empty() {
      return Err(CompileError::Structural(field_errors));
    }

    let graph = FlowGraph::from_draft(&draft.questions);
    let report = graph.validate();
    if !report.valid {
      return Err(CompileError::InvalidFlow(report));
    }
    Ok(graph)
  }
}

#[async_trait]
impl<S: Store> Compiler for StandardCompiler<S> {
  #[instrument(
    name = "compile_survey",
    skip(self, draft),
    fields(survey_id = %survey_id, question_count = draft.len())
  )]
  async fn compile(
    &self,
    survey_id: SurveyId,
    draft: DraftSurvey,
  ) -> Result<CompiledSurvey, CompileError> {
    info!("compile_started");

    let graph = match self.build_draft_graph(&draft) {
      Ok(graph) => graph,
      Err(e) => {
        warn!(error = %e, "compile_rejected");
        return Err(e);
      }
    };

    let _guard = self.locks.acquire(survey_id).await;

    let replacement = self
      .store
      .replace_questions(survey_id, &draft.questions, |ids| graph.to_persisted(ids))
      .await
      .map_err(|e| match e {
        surveyflow_store::Error::NotFound(_) => CompileError::SurveyNotFound(survey_id),
        source => CompileError::TransactionAborted { source },
      });
    let replacement = match replacement {
      Ok(replacement) => replacement,
      Err(e) => {
        warn!(error = %e, "compile_aborted");
        return Err(e);
      }
    };

    let survey = self.store.get_survey(survey_id).await?;

    info!(flow_version = replacement.flow_version, "compile_committed");

    Ok(CompiledSurvey {
      survey,
      questions: replacement.questions,
    })
  }

  fn check_draft(&self, draft: &DraftSurvey) -> Result<ValidationReport<usize>, CompileError> {
    check_draft(draft, &self.config.limits)
  }

  #[instrument(name = "validate_survey", skip(self), fields(survey_id = %survey_id))]
  async fn validate_survey(
    &self,
    survey_id: SurveyId,
  ) -> Result<ValidationReport<QuestionId>, CompileError> {
    self.store.get_survey(survey_id).await.map_err(|e| match e {
      surveyflow_store::Error::NotFound(_) => CompileError::SurveyNotFound(survey_id),
      other => CompileError::Store(other),
    })?;

    let questions = self.store.list_questions(survey_id).await?;
    let report = flow_graph(&questions).validate();

    info!(valid = report.valid, issues = report.errors.len(), "survey_validated");
    Ok(report)
  }
}
