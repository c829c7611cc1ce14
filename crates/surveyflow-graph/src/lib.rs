//! Surveyflow Graph
//!
//! This crate provides the flow graph for a survey: the ordered questions
//! plus the determinant that decides what follows each of them.
//!
//! The same structure exists in two identity spaces:
//! - draft graphs, keyed by position in the submitted list (`usize`)
//! - persisted graphs, keyed by [`QuestionId`]
//!
//! [`FlowGraph::from_draft`] builds the former from author input and
//! [`FlowGraph::to_persisted`] rewrites it into the latter once ids exist.
//! [`GraphValidator`] checks either form before it is used.

mod determinant;
mod error;
mod graph;
mod id;
mod validator;

pub use determinant::Determinant;
pub use error::{FlowIssue, GraphError};
pub use graph::{FlowGraph, FlowKey, FlowNode, Step};
pub use id::QuestionId;
pub use validator::{GraphValidator, ValidationReport, ValidationSummary};
