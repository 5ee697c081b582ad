//! docflow: a declarative document-analysis workflow engine.
//!
//! Workflows are YAML documents that name their inputs, the databases
//! they consult, a DAG of prompt-driven processing steps, and the
//! artifacts to write at the end. Database schemas are discovered at
//! run time, so workflow authors never describe tables by hand; prompts
//! reach into data sources through a small set of query capabilities
//! (`get_all`, `get_by_series`, `search`, `raw_query`) embedded in
//! `{{ }}` template placeholders.
//!
//! ```yaml
//! name: accuracy-analysis
//! inputs:
//!   - name: document
//!     type: file
//!     required: true
//! databases:
//!   meters: databases/meters.db
//! processing_steps:
//!   - name: extract_clauses
//!     prompt_template: |
//!       Extract accuracy requirements from: {{ document.content }}
//!   - name: recommend
//!     dependencies: [extract_clauses]
//!     prompt_template: |
//!       Requirements: {{ extract_clauses.parsedValue }}
//!       Catalog: {{ meters.get_all() }}
//! outputs:
//!   - type: json
//!     filename: "recommendations_{{ timestamp }}.json"
//!     content: "{{ recommend.rawText }}"
//! ```
//!
//! Steps run concurrently where the dependency graph allows, a failed
//! step skips only its dependents, and every run finishes with a full
//! per-step account in the [`engine::PipelineOutcome`].

pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod loader;
pub mod output;
pub mod schema;
pub mod template;
pub mod workflow;

pub use config::Config;
pub use engine::{PipelineEngine, PipelineOutcome};
pub use error::{Error, Result};
pub use workflow::{parse_workflow, parse_workflow_file, validate_workflow, WorkflowSpec};
