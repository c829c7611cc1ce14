mod compiler;
mod error;
mod locks;
mod structure;

pub use compiler::{CompiledSurvey, Compiler, CompilerConfig, StandardCompiler, check_draft};
pub use error::{CompileError, FieldError};
pub use locks::SurveyLocks;
pub use structure::check_structure;
