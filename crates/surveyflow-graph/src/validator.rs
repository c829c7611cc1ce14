use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FlowIssue;
use crate::graph::{FlowGraph, FlowKey, Step};

/// Outcome of validating a flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport<K> {
  pub valid: bool,
  pub errors: Vec<FlowIssue<K>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cycle_path: Option<Vec<K>>,
}

/// Author-facing rendering of a report: messages instead of typed issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary<K> {
  pub valid: bool,
  pub errors: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cycle_path: Option<Vec<K>>,
}

impl<K: FlowKey> ValidationReport<K> {
  fn from_issues(errors: Vec<FlowIssue<K>>, cycle_path: Option<Vec<K>>) -> Self {
    Self {
      valid: errors.is_empty(),
      errors,
      cycle_path,
    }
  }

  pub fn messages(&self) -> Vec<String> {
    self.errors.iter().map(ToString::to_string).collect()
  }

  pub fn summary(&self) -> ValidationSummary<K> {
    ValidationSummary {
      valid: self.valid,
      errors: self.messages(),
      cycle_path: self.cycle_path.clone(),
    }
  }
}

impl<K: FlowKey> fmt::Display for ValidationReport<K> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.valid {
      return f.write_str("valid");
    }
    f.write_str(&self.messages().join("; "))
  }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  OnStack,
  Done,
}

/// Structural checks over a [`FlowGraph`] in either identity space.
pub struct GraphValidator<'a, K: FlowKey> {
  graph: &'a FlowGraph<K>,
}

impl<'a, K: FlowKey> GraphValidator<'a, K> {
  pub fn new(graph: &'a FlowGraph<K>) -> Self {
    Self { graph }
  }

  /// Depth-first search from the start question.
  ///
  /// Returns the first cycle found as a path that starts and ends at the
  /// same question. Successors are visited in ascending order position.
  pub fn detect_cycle(&self) -> Option<Vec<K>> {
    if self.graph.is_empty() {
      return None;
    }

    let mut marks = vec![Mark::Unvisited; self.graph.len()];
    // One frame per question on the current path, with the successors
    // still to visit
    let mut frames: Vec<(usize, std::vec::IntoIter<usize>)> = Vec::new();
    marks[0] = Mark::OnStack;
    frames.push((0, self.graph.successors(0).into_iter()));

    while let Some((position, successors)) = frames.last_mut() {
      let position = *position;
      let Some(next) = successors.next() else {
        marks[position] = Mark::Done;
        frames.pop();
        continue;
      };

      match marks[next] {
        Mark::OnStack => {
          // Back edge: the cycle is the path from `next` onwards
          let start = frames.iter().position(|(p, _)| *p == next)?;
          let mut cycle: Vec<usize> = frames[start..].iter().map(|(p, _)| *p).collect();
          cycle.push(next);
          return Some(self.keys(&cycle));
        }
        Mark::Unvisited => {
          marks[next] = Mark::OnStack;
          frames.push((next, self.graph.successors(next).into_iter()));
        }
        Mark::Done => {}
      }
    }

    None
  }

  /// Breadth-first search from the start question; returns every question
  /// it never reaches, in order position.
  pub fn detect_unreachable(&self) -> Vec<K> {
    let reachable = self.reachable();
    self
      .graph
      .nodes()
      .iter()
      .zip(&reachable)
      .filter(|(_, seen)| !**seen)
      .map(|(node, _)| node.key)
      .collect()
  }

  /// Questions reachable from the start that can never reach an end.
  ///
  /// Reports [`FlowIssue::NoReachableEnd`] alone when no reachable
  /// question ends the survey at all.
  pub fn detect_non_terminating(&self) -> Vec<FlowIssue<K>> {
    let len = self.graph.len();
    if len == 0 {
      return Vec::new();
    }
    let reachable = self.reachable();

    if !(0..len).any(|p| reachable[p] && self.graph.can_end(p)) {
      return vec![FlowIssue::NoReachableEnd];
    }

    let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); len];
    for position in 0..len {
      for next in self.graph.successors(position) {
        reverse[next].push(position);
      }
    }

    // Walk backwards from every question that can end the survey
    let mut terminates = vec![false; len];
    let mut queue: VecDeque<usize> = (0..len).filter(|p| self.graph.can_end(*p)).collect();
    for position in &queue {
      terminates[*position] = true;
    }
    while let Some(position) = queue.pop_front() {
      for prev in &reverse[position] {
        if !terminates[*prev] {
          terminates[*prev] = true;
          queue.push_back(*prev);
        }
      }
    }

    (0..len)
      .filter(|p| reachable[*p] && !terminates[*p])
      .map(|p| FlowIssue::NonTerminating {
        question: self.graph.nodes()[p].key,
      })
      .collect()
  }

  /// Per-question reference checks: self loops, dangling targets,
  /// overrides on kinds that cannot branch and overrides for options
  /// that do not exist. Runs over every question, reachable or not.
  pub fn detect_invalid_references(&self) -> Vec<FlowIssue<K>> {
    let mut issues = Vec::new();

    for (position, node) in self.graph.nodes().iter().enumerate() {
      let determinants = std::iter::once(&node.default).chain(node.overrides.values());
      let mut self_reference = false;
      for det in determinants {
        match self.graph.step(position, det) {
          Step::Question(p) if p == position => self_reference = true,
          Step::Dangling(target) => issues.push(FlowIssue::DanglingTarget {
            question: node.key,
            target,
          }),
          _ => {}
        }
      }
      if self_reference {
        issues.push(FlowIssue::SelfReference { question: node.key });
      }

      if node.overrides.is_empty() {
        continue;
      }
      if !node.kind.supports_branching() {
        issues.push(FlowIssue::OverrideNotSupported {
          question: node.key,
          kind: node.kind,
        });
        continue;
      }
      let slots = node.branch_slots();
      for option in node.overrides.keys().filter(|o| **o >= slots) {
        issues.push(FlowIssue::OrphanedOverride {
          question: node.key,
          option: *option,
        });
      }
    }

    issues
  }

  /// Run every check and collect all issues found.
  pub fn validate(&self) -> ValidationReport<K> {
    if self.graph.is_empty() {
      return ValidationReport::from_issues(vec![FlowIssue::Empty], None);
    }

    let mut issues = self.detect_invalid_references();

    let cycle_path = self.detect_cycle();
    if let Some(path) = &cycle_path {
      issues.push(FlowIssue::Cycle { path: path.clone() });
    }

    issues.extend(
      self
        .detect_unreachable()
        .into_iter()
        .map(|question| FlowIssue::Unreachable { question }),
    );
    issues.extend(self.detect_non_terminating());

    ValidationReport::from_issues(issues, cycle_path)
  }

  fn reachable(&self) -> Vec<bool> {
    let mut seen = vec![false; self.graph.len()];
    if seen.is_empty() {
      return seen;
    }
    let mut queue = VecDeque::from([0]);
    seen[0] = true;
    while let Some(position) = queue.pop_front() {
      for next in self.graph.successors(position) {
        if !seen[next] {
          seen[next] = true;
          queue.push_back(next);
        }
      }
    }
    seen
  }

  fn keys(&self, positions: &[usize]) -> Vec<K> {
    positions
      .iter()
      .map(|p| self.graph.nodes()[*p].key)
      .collect()
  }
}

impl<K: FlowKey> FlowGraph<K> {
  /// Shorthand for [`GraphValidator::validate`].
  pub fn validate(&self) -> ValidationReport<K> {
    GraphValidator::new(self).validate()
  }
}
