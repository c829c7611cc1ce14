//! Surveyflow Config
//!
//! This crate contains the serializable draft types an author submits when
//! building a survey. Drafts address questions by their position in the
//! submitted list; nothing here has been validated or persisted yet.
//!
//! Drafts can be loaded from:
//! - JSON files (via CLI with `surveyflow compile <survey> draft.json`)
//! - Any serde-compatible request body
//!
//! The compiler takes these types, checks them against [`CompilerLimits`],
//! validates the flow they describe and installs them as persisted questions.

mod enums;
mod limits;
mod question;
mod survey;
mod target;

pub use enums::{QuestionKind, RATING_MAX, RATING_MIN, UnknownQuestionKind};
pub use limits::CompilerLimits;
pub use question::DraftQuestion;
pub use survey::DraftSurvey;
pub use target::{DraftTarget, InvalidDraftTarget, SENTINEL_SEQUENTIAL};
