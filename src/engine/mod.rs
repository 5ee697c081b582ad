//! Pipeline engine: ties input resolution, schema discovery, template
//! rendering, generation, and output rendering into one run.

pub mod executor;
pub mod inputs;

pub use executor::{
    OutputRecord, PipelineEngine, PipelineOutcome, RunContext, StepRecord, StepStatus,
};
pub use inputs::resolve_inputs;
