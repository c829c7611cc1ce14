//! Structural pass: per-field checks that need no graph and no storage.

use std::collections::HashSet;

use surveyflow_config::{CompilerLimits, DraftSurvey};

use crate::error::FieldError;

/// Check every question against `limits`, collecting all problems.
pub fn check_structure(draft: &DraftSurvey, limits: &CompilerLimits) -> Vec<FieldError> {
  let mut errors = Vec::new();

  if draft.is_empty() {
    errors.push(FieldError::survey("questions", "at least one question is required"));
  }
  if draft.len() > limits.max_questions {
    errors.push(FieldError::survey(
      "questions",
      format!(
        "{} questions exceeds the limit of {}",
        draft.len(),
        limits.max_questions
      ),
    ));
  }

  for (index, question) in draft.questions.iter().enumerate() {
    let text_len = question.text.trim().chars().count();
    if text_len < limits.min_text_len || text_len > limits.max_text_len {
      errors.push(FieldError::question(
        index,
        "text",
        format!(
          "must be between {} and {} characters, got {text_len}",
          limits.min_text_len, limits.max_text_len
        ),
      ));
    }

    let kind = question.kind;
    if kind.has_options() {
      let count = question.options.len();
      if count < limits.min_options || count > limits.max_options {
        errors.push(FieldError::question(
          index,
          "options",
          format!(
            "{kind} questions need between {} and {} options, got {count}",
            limits.min_options, limits.max_options
          ),
        ));
      }

      let mut seen = HashSet::new();
      for (position, option) in question.options.iter().enumerate() {
        let label = option.trim();
        if label.is_empty() {
          errors.push(FieldError::question(
            index,
            "options",
            format!("option {position} is empty"),
          ));
          continue;
        }
        if label.chars().count() > limits.max_option_len {
          errors.push(FieldError::question(
            index,
            "options",
            format!(
              "option {position} exceeds {} characters",
              limits.max_option_len
            ),
          ));
        }
        if !seen.insert(label.to_lowercase()) {
          errors.push(FieldError::question(
            index,
            "options",
            format!("option {position} duplicates \"{label}\""),
          ));
        }
      }
    } else if !question.options.is_empty() {
      errors.push(FieldError::question(
        index,
        "options",
        format!("{kind} questions do not take options"),
      ));
    }

    if question.option_next_indexes.is_empty() {
      continue;
    }
    if !kind.supports_branching() {
      errors.push(FieldError::question(
        index,
        "option_next_indexes",
        format!("{kind} questions cannot branch per option"),
      ));
      continue;
    }
    let slots = kind.branch_slots(question.options.len());
    for option in question.option_next_indexes.keys().filter(|o| **o >= slots) {
      errors.push(FieldError::question(
        index,
        "option_next_indexes",
        format!("option {option} does not exist"),
      ));
    }
  }

  errors
}
