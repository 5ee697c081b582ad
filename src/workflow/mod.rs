//! Workflow description model, parsing, and validation.

pub mod dag;
pub mod parser;
pub mod types;
pub mod validator;

pub use parser::{parse_workflow, parse_workflow_file};
pub use types::{InputDecl, InputKind, OutputDecl, OutputKind, StepDecl, WorkflowSpec};
pub use validator::validate_workflow;
