use std::fmt::Display;

use serde::Serialize;
use surveyflow_config::QuestionKind;
use thiserror::Error;

/// Failure to translate a draft graph into persisted identifiers.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("id mapping has {actual} entries but the draft has {expected} questions")]
  MappingLength { expected: usize, actual: usize },

  #[error("question {question} targets draft index {index}, which has no persisted id")]
  UnmappedIndex { question: usize, index: usize },
}

/// A structural problem found by the validator.
///
/// Every issue names the offending question in the graph's own identity
/// space, so draft reports speak in positions and persisted reports in ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum FlowIssue<K> {
  #[error("survey has no questions")]
  Empty,

  #[error("question {question} navigates to itself")]
  SelfReference { question: K },

  #[error("question {question} targets {target}, which is not in this survey")]
  DanglingTarget { question: K, target: K },

  #[error("question {question} is {kind} and cannot branch per option")]
  OverrideNotSupported { question: K, kind: QuestionKind },

  #[error("question {question} has a branch for option {option}, which does not exist")]
  OrphanedOverride { question: K, option: usize },

  #[error("cycle detected: {}", join_path(.path))]
  Cycle { path: Vec<K> },

  #[error("question {question} is unreachable from the start question")]
  Unreachable { question: K },

  #[error("no path from the start question reaches the end of the survey")]
  NoReachableEnd,

  #[error("question {question} can never reach the end of the survey")]
  NonTerminating { question: K },
}

fn join_path<K: Display>(path: &[K]) -> String {
  path
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(" -> ")
}
