use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use serde::Serialize;
use surveyflow_config::{DraftQuestion, QuestionKind};

use crate::determinant::Determinant;
use crate::error::GraphError;
use crate::id::QuestionId;

/// Identity space a graph can be keyed by.
pub trait FlowKey: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display {}

impl<T: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display> FlowKey for T {}

/// One question in the flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowNode<K> {
  pub key: K,
  pub kind: QuestionKind,
  pub option_count: usize,
  /// Determinant applied when no override matches.
  pub default: Determinant<K>,
  /// Overrides keyed by option (or rating scale) index.
  pub overrides: BTreeMap<usize, Determinant<K>>,
}

impl<K> FlowNode<K> {
  /// Number of option slots an override may address.
  pub fn branch_slots(&self) -> usize {
    self.kind.branch_slots(self.option_count)
  }

  /// Overrides that can actually be taken at answer time.
  ///
  /// Non-branching kinds ignore their overrides entirely and out-of-range
  /// option indexes never match an answer.
  pub fn live_overrides(&self) -> impl Iterator<Item = (usize, &Determinant<K>)> {
    let slots = if self.kind.supports_branching() {
      self.branch_slots()
    } else {
      0
    };
    self
      .overrides
      .iter()
      .filter(move |(option, _)| **option < slots)
      .map(|(option, det)| (*option, det))
  }
}

/// Where following a determinant from a given position leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<K> {
  /// The question at this order position.
  Question(usize),
  End,
  /// The determinant names a key that is not in the graph.
  Dangling(K),
}

/// Questions in order position plus their determinants.
///
/// Nodes live in a flat vector indexed by order position; determinants
/// refer to keys, which resolve to positions through `positions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowGraph<K: FlowKey> {
  nodes: Vec<FlowNode<K>>,
  #[serde(skip)]
  positions: HashMap<K, usize>,
}

impl<K: FlowKey> FlowGraph<K> {
  /// Build a graph from nodes already sorted by order position.
  pub fn new(nodes: Vec<FlowNode<K>>) -> Self {
    let mut positions = HashMap::with_capacity(nodes.len());
    for (position, node) in nodes.iter().enumerate() {
      positions.entry(node.key).or_insert(position);
    }
    Self { nodes, positions }
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn nodes(&self) -> &[FlowNode<K>] {
    &self.nodes
  }

  /// The node at an order position.
  pub fn node(&self, position: usize) -> Option<&FlowNode<K>> {
    self.nodes.get(position)
  }

  /// The start question (order position 0).
  pub fn start(&self) -> Option<&FlowNode<K>> {
    self.nodes.first()
  }

  pub fn position_of(&self, key: &K) -> Option<usize> {
    self.positions.get(key).copied()
  }

  pub fn get(&self, key: &K) -> Option<&FlowNode<K>> {
    self.position_of(key).and_then(|p| self.nodes.get(p))
  }

  /// Follow a determinant from the question at `position`.
  ///
  /// `Sequential` resolves to the next order position, or to the end when
  /// `position` is the last question.
  pub fn step(&self, position: usize, determinant: &Determinant<K>) -> Step<K> {
    match determinant {
      Determinant::EndSurvey => Step::End,
      Determinant::Sequential if position + 1 < self.nodes.len() => Step::Question(position + 1),
      Determinant::Sequential => Step::End,
      Determinant::GoToQuestion { target } => match self.position_of(target) {
        Some(next) => Step::Question(next),
        None => Step::Dangling(*target),
      },
    }
  }

  /// Every step the question at `position` can take: its default plus
  /// each live override.
  pub fn steps(&self, position: usize) -> Vec<Step<K>> {
    let Some(node) = self.nodes.get(position) else {
      return Vec::new();
    };
    std::iter::once(&node.default)
      .chain(node.live_overrides().map(|(_, det)| det))
      .map(|det| self.step(position, det))
      .collect()
  }

  /// Successor positions in ascending order, without duplicates.
  ///
  /// Self-edges are left out; they are reported as self references.
  pub fn successors(&self, position: usize) -> Vec<usize> {
    let mut next: Vec<usize> = self
      .steps(position)
      .into_iter()
      .filter_map(|step| match step {
        Step::Question(p) if p != position => Some(p),
        _ => None,
      })
      .collect();
    next.sort_unstable();
    next.dedup();
    next
  }

  /// Whether some determinant of the question at `position` ends the survey.
  pub fn can_end(&self, position: usize) -> bool {
    self
      .steps(position)
      .iter()
      .any(|step| matches!(step, Step::End))
  }
}

impl FlowGraph<usize> {
  /// Build a draft graph keyed by position in the submitted list.
  pub fn from_draft(questions: &[DraftQuestion]) -> Self {
    let nodes = questions
      .iter()
      .enumerate()
      .map(|(position, q)| FlowNode {
        key: position,
        kind: q.kind,
        option_count: q.options.len(),
        default: q.default_next_index.into(),
        overrides: q
          .option_next_indexes
          .iter()
          .map(|(option, target)| (*option, (*target).into()))
          .collect(),
      })
      .collect();
    Self::new(nodes)
  }

  /// Rewrite every draft reference into the persisted id assigned to it.
  ///
  /// `ids[i]` is the id of the question inserted from draft position `i`.
  pub fn to_persisted(&self, ids: &[QuestionId]) -> Result<FlowGraph<QuestionId>, GraphError> {
    if ids.len() != self.nodes.len() {
      return Err(GraphError::MappingLength {
        expected: self.nodes.len(),
        actual: ids.len(),
      });
    }

    let nodes = self
      .nodes
      .iter()
      .map(|node| -> Result<FlowNode<QuestionId>, GraphError> {
        let translate = |index: usize| {
          ids.get(index).copied().ok_or(GraphError::UnmappedIndex {
            question: node.key,
            index,
          })
        };
        let overrides = node
          .overrides
          .iter()
          .map(|(option, det)| -> Result<_, GraphError> { Ok((*option, det.try_map(translate)?)) })
          .collect::<Result<BTreeMap<_, _>, GraphError>>()?;

        Ok(FlowNode {
          key: ids[node.key],
          kind: node.kind,
          option_count: node.option_count,
          default: node.default.try_map(translate)?,
          overrides,
        })
      })
      .collect::<Result<Vec<_>, GraphError>>()?;

    Ok(FlowGraph::new(nodes))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use surveyflow_config::DraftTarget;

  fn text(target: DraftTarget) -> DraftQuestion {
    DraftQuestion::new("q", QuestionKind::Text).with_default_next(target)
  }

  #[test]
  fn test_from_draft_sentinels_independent_of_position() {
    for len in 1..6 {
      let questions: Vec<_> = (0..len)
        .map(|i| {
          if i % 2 == 0 {
            text(DraftTarget::Sequential)
          } else {
            text(DraftTarget::End)
          }
        })
        .collect();
      let graph = FlowGraph::from_draft(&questions);
      for (i, node) in graph.nodes().iter().enumerate() {
        let expected = if i % 2 == 0 {
          Determinant::Sequential
        } else {
          Determinant::EndSurvey
        };
        assert_eq!(node.default, expected);
      }
    }
  }

  #[test]
  fn test_from_draft_keeps_out_of_range_targets() {
    let graph = FlowGraph::from_draft(&[text(DraftTarget::Question(9))]);
    assert_eq!(graph.node(0).unwrap().default, Determinant::go_to(9));
    assert_eq!(graph.step(0, &Determinant::go_to(9)), Step::Dangling(9));
  }

  #[test]
  fn test_sequential_on_last_question_ends() {
    let graph = FlowGraph::from_draft(&[text(DraftTarget::Sequential), text(DraftTarget::Sequential)]);
    assert_eq!(graph.step(0, &Determinant::Sequential), Step::Question(1));
    assert_eq!(graph.step(1, &Determinant::Sequential), Step::End);
    assert!(graph.can_end(1));
    assert!(!graph.can_end(0));
  }

  #[test]
  fn test_successors_include_live_overrides_sorted() {
    let questions = vec![
      DraftQuestion::new("pick", QuestionKind::SingleChoice)
        .with_options(["a", "b", "c"])
        .with_default_next(DraftTarget::Question(3))
        .with_option_next(0, DraftTarget::Question(2))
        .with_option_next(1, DraftTarget::Question(1))
        // option 5 does not exist, so it is never followed
        .with_option_next(5, DraftTarget::Question(4)),
      text(DraftTarget::End),
      text(DraftTarget::End),
      text(DraftTarget::End),
      text(DraftTarget::End),
    ];
    let graph = FlowGraph::from_draft(&questions);
    assert_eq!(graph.successors(0), vec![1, 2, 3]);
  }

  #[test]
  fn test_overrides_on_non_branching_kind_are_not_followed() {
    let questions = vec![
      DraftQuestion::new("many", QuestionKind::MultipleChoice)
        .with_options(["a", "b"])
        .with_option_next(0, DraftTarget::Question(2)),
      text(DraftTarget::End),
      text(DraftTarget::End),
    ];
    let graph = FlowGraph::from_draft(&questions);
    assert_eq!(graph.successors(0), vec![1]);
  }

  #[test]
  fn test_to_persisted_rewrites_targets() {
    let questions = vec![
      DraftQuestion::new("pick", QuestionKind::SingleChoice)
        .with_options(["a", "b"])
        .with_option_next(0, DraftTarget::End)
        .with_option_next(1, DraftTarget::Question(2)),
      text(DraftTarget::Question(2)),
      text(DraftTarget::Sequential),
    ];
    let draft = FlowGraph::from_draft(&questions);
    let ids = [QuestionId(101), QuestionId(102), QuestionId(103)];
    let persisted = draft.to_persisted(&ids).unwrap();

    let first = persisted.node(0).unwrap();
    assert_eq!(first.key, QuestionId(101));
    assert_eq!(first.default, Determinant::Sequential);
    assert_eq!(first.overrides[&0], Determinant::EndSurvey);
    assert_eq!(first.overrides[&1], Determinant::go_to(QuestionId(103)));
    assert_eq!(persisted.node(1).unwrap().default, Determinant::go_to(QuestionId(103)));
    assert_eq!(persisted.position_of(&QuestionId(103)), Some(2));
  }

  #[test]
  fn test_to_persisted_rejects_short_mapping() {
    let draft = FlowGraph::from_draft(&[text(DraftTarget::Sequential), text(DraftTarget::End)]);
    let err = draft.to_persisted(&[QuestionId(1)]).unwrap_err();
    assert!(matches!(
      err,
      GraphError::MappingLength {
        expected: 2,
        actual: 1
      }
    ));
  }

  #[test]
  fn test_to_persisted_rejects_unmapped_target() {
    let draft = FlowGraph::from_draft(&[text(DraftTarget::Question(7))]);
    let err = draft.to_persisted(&[QuestionId(1)]).unwrap_err();
    assert!(matches!(
      err,
      GraphError::UnmappedIndex {
        question: 0,
        index: 7
      }
    ));
  }
}
