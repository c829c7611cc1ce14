//! Answer-time navigation for surveyflow.
//!
//! # Architecture
//!
//! ```text
//! Navigator
//! ├── start_response(survey_id, respondent) -> StartedResponse
//! ├── resolve_next(ResolveNext) -> NextStep
//! │   ├── validate_answer - answer shape matches the question kind
//! │   ├── resolve         - override, else default, Sequential by position
//! │   └── record_answer   - stamp the step onto the answer (and complete)
//! └── history(response_id) -> Vec<Answer>
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use surveyflow_navigator::{Navigator, ResolveNext};
//!
//! let navigator = Navigator::new(store);
//! let started = navigator.start_response(survey_id, "alice").await?;
//!
//! let next = navigator
//!   .resolve_next(ResolveNext {
//!     response_id: started.response.response_id,
//!     current_question_id: started.first_question.question_id,
//!     answer: AnswerValue::Text { text: "hello".into() },
//!   })
//!   .await?;
//! ```

mod error;
mod navigator;
mod resolution;

pub use error::NavigationError;
pub use navigator::{Navigator, NextStep, ResolveNext, StartedResponse};
pub use resolution::{Resolution, resolve, validate_answer};
pub use surveyflow_store::AnswerValue;
