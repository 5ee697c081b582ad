//! Pipeline execution.
//!
//! Steps run in dependency waves: every step whose dependencies are
//! settled runs concurrently with the rest of its wave, and its result
//! is bound into the template context under the step's name before the
//! next wave starts. A failed step never aborts the run; its dependents
//! are skipped and everything else continues, so a run can finish with
//! partial results.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn, Span};

use crate::error::{Error, Result};
use crate::generation::{GenerationClient, GenerationResult};
use crate::loader::{DocumentLoader, TextDocumentLoader};
use crate::output::{Artifact, FileOutputRenderer, OutputRenderer};
use crate::schema::{CapabilityRegistry, QueryAccessor, SchemaDiscovery};
use crate::template::{self, Expr, ValueExpr, VarMap};
use crate::workflow::{dag, validate_workflow, WorkflowSpec};

use super::inputs::resolve_inputs;

/// Identity of one run, bound into every template context as
/// `{{ timestamp }}` and `{{ run_id }}`.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub run_id: String,
    pub timestamp: String,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now().format("%Y%m%d_%H%M%S").to_string(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal status of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
}

/// Record of one step's execution.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    /// Why the step was skipped, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Record of one output declaration's evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRecord {
    pub filename: String,
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The full result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub workflow: String,
    pub run_id: String,
    pub timestamp: String,
    /// True only when every step completed successfully and every
    /// non-skipped output was written.
    pub success: bool,
    pub steps: Vec<StepRecord>,
    pub outputs: Vec<OutputRecord>,
}

/// Executes workflows end to end: input resolution, schema discovery,
/// wave-ordered step execution, and output rendering.
pub struct PipelineEngine {
    client: Arc<GenerationClient>,
    loader: Arc<dyn DocumentLoader>,
    renderer: Arc<dyn OutputRenderer>,
    discovery: Mutex<SchemaDiscovery>,
}

impl PipelineEngine {
    pub fn new(client: Arc<GenerationClient>) -> Self {
        Self {
            client,
            loader: Arc::new(TextDocumentLoader),
            renderer: Arc::new(FileOutputRenderer::new("outputs")),
            discovery: Mutex::new(SchemaDiscovery::new()),
        }
    }

    /// Replace the document loader.
    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Replace the output renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn OutputRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Run a workflow with the given raw input values.
    ///
    /// Fails fast on validation problems, bad inputs, and unreachable
    /// data sources. Once steps start, failures stay in-band.
    #[instrument(
        name = "pipeline.run",
        skip(self, spec, provided),
        fields(workflow = %spec.name, run_id = tracing::field::Empty)
    )]
    pub async fn run(
        &self,
        spec: &WorkflowSpec,
        provided: &HashMap<String, String>,
    ) -> Result<PipelineOutcome> {
        validate_workflow(spec)?;

        let run = RunContext::new();
        Span::current().record("run_id", run.run_id.as_str());
        info!("starting run {} of workflow '{}'", run.run_id, spec.name);

        let mut vars = resolve_inputs(spec, provided, self.loader.as_ref())?;
        vars.insert("timestamp".to_string(), Value::String(run.timestamp.clone()));
        vars.insert("run_id".to_string(), Value::String(run.run_id.clone()));

        let registry = Arc::new(self.connect_sources(spec)?);

        let records = self.run_steps(spec, &mut vars, &registry).await;
        let outputs = self.evaluate_outputs(spec, &vars, &registry);

        let steps_ok = records.iter().all(|r| r.status == StepStatus::Completed);
        let outputs_ok = outputs.iter().all(|o| o.error.is_none());
        let success = steps_ok && outputs_ok;

        info!(
            success,
            completed = records.iter().filter(|r| r.status == StepStatus::Completed).count(),
            failed = records.iter().filter(|r| r.status == StepStatus::Failed).count(),
            skipped = records.iter().filter(|r| r.status == StepStatus::Skipped).count(),
            "run finished"
        );

        Ok(PipelineOutcome {
            workflow: spec.name.clone(),
            run_id: run.run_id,
            timestamp: run.timestamp,
            success,
            steps: records,
            outputs,
        })
    }

    /// Discover every declared data source and open read-only accessors.
    /// An unreachable source aborts the run before any step executes.
    fn connect_sources(&self, spec: &WorkflowSpec) -> Result<CapabilityRegistry> {
        let mut registry = CapabilityRegistry::new();
        let mut discovery = self
            .discovery
            .lock()
            .map_err(|_| Error::Input("schema discovery state poisoned".to_string()))?;

        for (name, locator) in &spec.databases {
            let schema = discovery.discover(locator)?;
            let accessor = QueryAccessor::open(schema)?;
            info!(source = %name, locator = %locator, "connected data source");
            registry.register(name, accessor);
        }
        Ok(registry)
    }

    async fn run_steps(
        &self,
        spec: &WorkflowSpec,
        vars: &mut VarMap,
        registry: &Arc<CapabilityRegistry>,
    ) -> Vec<StepRecord> {
        let mut settled: HashMap<String, StepStatus> = HashMap::new();
        let mut records: HashMap<String, StepRecord> = HashMap::new();

        for wave in dag::execution_waves(&spec.processing_steps) {
            let mut join_set: JoinSet<(String, StepRecord)> = JoinSet::new();

            for name in wave {
                let step = spec
                    .get_step(&name)
                    .expect("wave names come from the step list");

                // A step whose dependency failed or was skipped cannot
                // render a meaningful prompt; skip it and let the skip
                // propagate.
                let blocked: Vec<&String> = step
                    .dependencies
                    .iter()
                    .filter(|d| settled.get(*d) != Some(&StepStatus::Completed))
                    .collect();
                if !blocked.is_empty() {
                    let reason = format!(
                        "dependency not completed: {}",
                        blocked
                            .iter()
                            .map(|s| s.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    warn!(step = %name, "skipping step: {}", reason);
                    settled.insert(name.clone(), StepStatus::Skipped);
                    vars.insert(
                        name.clone(),
                        result_value(&GenerationResult::failure(reason.clone())),
                    );
                    records.insert(
                        name.clone(),
                        StepRecord {
                            name,
                            status: StepStatus::Skipped,
                            duration_ms: 0,
                            result: None,
                            reason: Some(reason),
                        },
                    );
                    continue;
                }

                let template_str = step.prompt_template.clone();
                let timeout = step.timeout;
                let step_name = name.clone();
                let task_vars = vars.clone();
                let task_registry = Arc::clone(registry);
                let client = Arc::clone(&self.client);

                join_set.spawn(async move {
                    let started = Instant::now();
                    let result = match template::render(
                        &template_str,
                        &task_vars,
                        Some(task_registry.as_ref()),
                    ) {
                        Ok(prompt) => client.process(&prompt, timeout).await,
                        Err(e) => {
                            warn!(step = %step_name, "prompt rendering failed: {}", e);
                            GenerationResult::failure(format!("[{}] {}", e.code(), e))
                        }
                    };

                    let status = if result.success {
                        StepStatus::Completed
                    } else {
                        StepStatus::Failed
                    };
                    let record = StepRecord {
                        name: step_name.clone(),
                        status,
                        duration_ms: started.elapsed().as_millis() as u64,
                        result: Some(result),
                        reason: None,
                    };
                    (step_name, record)
                });
            }

            while let Some(joined) = join_set.join_next().await {
                let (name, record) = match joined {
                    Ok(pair) => pair,
                    Err(e) => {
                        // A panicked step task is a bug; surface it as a
                        // failed step rather than poisoning the run.
                        warn!("step task panicked: {}", e);
                        continue;
                    }
                };
                info!(step = %name, status = ?record.status, duration_ms = record.duration_ms, "step finished");
                settled.insert(name.clone(), record.status);
                if let Some(result) = &record.result {
                    vars.insert(name.clone(), result_value(result));
                }
                records.insert(name, record);
            }
        }

        // Report in declaration order regardless of completion order.
        spec.processing_steps
            .iter()
            .filter_map(|s| records.remove(&s.name))
            .collect()
    }

    fn evaluate_outputs(
        &self,
        spec: &WorkflowSpec,
        vars: &VarMap,
        registry: &Arc<CapabilityRegistry>,
    ) -> Vec<OutputRecord> {
        let mut records = Vec::new();
        let step_names: HashSet<&str> = spec
            .processing_steps
            .iter()
            .map(|s| s.name.as_str())
            .collect();

        for output in &spec.outputs {
            let record = self.evaluate_output(output, vars, registry, &step_names);
            if let Some(error) = &record.error {
                warn!(filename = %record.filename, "output failed: {}", error);
            } else if record.written {
                info!(path = record.path.as_deref().unwrap_or(""), "output written");
            }
            records.push(record);
        }
        records
    }

    fn evaluate_output(
        &self,
        output: &crate::workflow::OutputDecl,
        vars: &VarMap,
        registry: &Arc<CapabilityRegistry>,
        step_names: &HashSet<&str>,
    ) -> OutputRecord {
        let registry = Some(registry.as_ref());

        let filename = match template::render(&output.filename, vars, registry) {
            Ok(f) => f,
            Err(e) => {
                return OutputRecord {
                    filename: output.filename.clone(),
                    written: false,
                    path: None,
                    error: Some(format!("[{}] {}", e.code(), e)),
                }
            }
        };

        // An output that reads from a failed or skipped step would only
        // substitute empty failure text; skip it like a false condition.
        if let Some(step) = failed_referenced_step(output, vars, step_names) {
            info!(filename = %filename, step = %step, "skipping output: referenced step did not complete");
            return OutputRecord {
                filename,
                written: false,
                path: None,
                error: None,
            };
        }

        if let Some(condition) = &output.condition {
            match template::render(condition, vars, registry) {
                Ok(rendered) if !is_truthy(&rendered) => {
                    return OutputRecord {
                        filename,
                        written: false,
                        path: None,
                        error: None,
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    return OutputRecord {
                        filename,
                        written: false,
                        path: None,
                        error: Some(format!("[{}] {}", e.code(), e)),
                    }
                }
            }
        }

        let rendered = self.render_artifact(output, &filename, vars, registry);
        match rendered.and_then(|artifact| self.renderer.render(&artifact)) {
            Ok(path) => OutputRecord {
                filename,
                written: true,
                path: Some(path.display().to_string()),
                error: None,
            },
            Err(e) => OutputRecord {
                filename,
                written: false,
                path: None,
                error: Some(format!("[{}] {}", e.code(), e)),
            },
        }
    }

    fn render_artifact(
        &self,
        output: &crate::workflow::OutputDecl,
        filename: &str,
        vars: &VarMap,
        registry: Option<&CapabilityRegistry>,
    ) -> Result<Artifact> {
        let content = output
            .content
            .as_ref()
            .map(|c| template::render(c, vars, registry))
            .transpose()?;
        let data = output
            .data
            .as_ref()
            .map(|d| template::render_value(d, vars, registry))
            .transpose()?;

        Ok(Artifact {
            kind: output.kind,
            filename: filename.to_string(),
            content,
            data,
        })
    }
}

/// The first step referenced by the output whose result is missing or
/// unsuccessful, if any.
fn failed_referenced_step(
    output: &crate::workflow::OutputDecl,
    vars: &VarMap,
    step_names: &HashSet<&str>,
) -> Option<String> {
    for template_str in output.template_strings() {
        // Validation already rejected malformed templates; a scan error
        // here surfaces later through rendering.
        let refs = match template::scan_references(template_str) {
            Ok(refs) => refs,
            Err(_) => continue,
        };
        for reference in refs {
            let mut heads = Vec::new();
            match &reference {
                Expr::Path(path) => heads.push(path[0].as_str()),
                Expr::Call { args, .. } => {
                    for arg in args {
                        if let ValueExpr::Path(path) = &arg.value {
                            heads.push(path[0].as_str());
                        }
                    }
                }
            }
            for head in heads {
                if !step_names.contains(head) {
                    continue;
                }
                let succeeded = vars
                    .get(head)
                    .and_then(|v| v.get("success"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if !succeeded {
                    return Some(head.to_string());
                }
            }
        }
    }
    None
}

/// A step result as templates see it, with camelCase field names.
fn result_value(result: &GenerationResult) -> Value {
    serde_json::to_value(result).unwrap_or(Value::Null)
}

fn is_truthy(rendered: &str) -> bool {
    matches!(rendered.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::Generator;
    use crate::output::FileOutputRenderer;
    use crate::schema::tests::fixture_db;
    use crate::workflow::parse_workflow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Generator that answers by prompt keyword, so multi-step workflows
    /// get distinct step results.
    struct KeywordGenerator;

    #[async_trait]
    impl Generator for KeywordGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            if prompt.contains("Extract") {
                Ok(r#"Found clauses: {"required_accuracy": "±0.5%"}"#.to_string())
            } else if prompt.contains("Recommend") {
                Ok(r#"{"model": "PM5320", "accuracy": "±0.5%"}"#.to_string())
            } else {
                Ok("plain answer".to_string())
            }
        }
    }

    struct FailOnKeyword {
        keyword: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for FailOnKeyword {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains(self.keyword) {
                Err(Error::ServiceUnavailable("backend refused".to_string()))
            } else {
                Ok("ok".to_string())
            }
        }
    }

    fn engine_with(generator: Arc<dyn Generator>, outputs_dir: &Path) -> PipelineEngine {
        PipelineEngine::new(Arc::new(GenerationClient::new(generator)))
            .with_renderer(Arc::new(FileOutputRenderer::new(outputs_dir)))
    }

    #[tokio::test]
    async fn test_end_to_end_run() {
        let dir = TempDir::new().unwrap();
        let db_path = fixture_db(&dir);
        let doc_path = dir.path().join("tender.txt");
        std::fs::write(&doc_path, "Meters shall achieve ±0.5% accuracy.").unwrap();
        let outputs_dir = dir.path().join("outputs");

        let yaml = format!(
            r#"
name: accuracy-analysis
inputs:
  - name: document
    type: file
    required: true
    formats: [txt]
databases:
  meters: "{db}"
processing_steps:
  - name: extract_clauses
    prompt_template: "Extract accuracy clauses from: {{{{ document.content }}}}"
  - name: recommend
    dependencies: [extract_clauses]
    prompt_template: |
      Recommend a meter for {{{{ extract_clauses.parsedValue }}}}
      Catalog: {{{{ meters.get_all('Meters') }}}}
outputs:
  - type: text
    filename: "report_{{{{ timestamp }}}}.txt"
    content: "Recommendation: {{{{ recommend.rawText }}}}"
  - type: json
    filename: "result.json"
    content: "{{{{ recommend.rawText }}}}"
    condition: "{{{{ recommend.success }}}}"
"#,
            db = db_path
        );
        let spec = parse_workflow(&yaml).unwrap();

        let engine = engine_with(Arc::new(KeywordGenerator), &outputs_dir);
        let provided: HashMap<String, String> =
            [("document".to_string(), doc_path.display().to_string())].into();

        let outcome = engine.run(&spec, &provided).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.steps.len(), 2);
        assert!(outcome
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Completed));

        let extract = &outcome.steps[0];
        assert_eq!(extract.name, "extract_clauses");
        let parsed = extract.result.as_ref().unwrap().parsed_value.as_ref().unwrap();
        assert_eq!(parsed["required_accuracy"], "±0.5%");

        assert_eq!(outcome.outputs.len(), 2);
        assert!(outcome.outputs.iter().all(|o| o.written));
        let report = std::fs::read_to_string(outcome.outputs[0].path.as_ref().unwrap()).unwrap();
        assert!(report.contains("±0.5%"), "{}", report);

        let result: Value = serde_json::from_str(
            &std::fs::read_to_string(outcome.outputs[1].path.as_ref().unwrap()).unwrap(),
        )
        .unwrap();
        assert_eq!(result["model"], "PM5320");
    }

    #[tokio::test]
    async fn test_failed_step_skips_dependents_but_not_others() {
        let dir = TempDir::new().unwrap();
        let outputs_dir = dir.path().join("outputs");

        let spec = parse_workflow(
            r#"
name: partial
processing_steps:
  - name: doomed
    prompt_template: "POISON prompt"
  - name: dependent
    dependencies: [doomed]
    prompt_template: "uses {{ doomed.rawText }}"
  - name: independent
    prompt_template: "stands alone"
"#,
        )
        .unwrap();

        let generator = Arc::new(FailOnKeyword {
            keyword: "POISON",
            calls: AtomicUsize::new(0),
        });
        let engine = engine_with(generator.clone(), &outputs_dir);

        let outcome = engine.run(&spec, &HashMap::new()).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.steps[0].status, StepStatus::Failed);
        assert_eq!(outcome.steps[1].status, StepStatus::Skipped);
        assert!(outcome.steps[1].reason.as_ref().unwrap().contains("doomed"));
        assert_eq!(outcome.steps[2].status, StepStatus::Completed);
        // The skipped step never reached the backend.
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_false_condition_skips_output_without_error() {
        let dir = TempDir::new().unwrap();
        let outputs_dir = dir.path().join("outputs");

        let spec = parse_workflow(
            r#"
name: conditional
processing_steps:
  - name: doomed
    prompt_template: "POISON"
outputs:
  - type: text
    filename: "never.txt"
    content: "{{ doomed.rawText }}"
    condition: "{{ doomed.success }}"
"#,
        )
        .unwrap();

        let generator = Arc::new(FailOnKeyword {
            keyword: "POISON",
            calls: AtomicUsize::new(0),
        });
        let engine = engine_with(generator, &outputs_dir);
        let outcome = engine.run(&spec, &HashMap::new()).await.unwrap();

        assert_eq!(outcome.outputs.len(), 1);
        assert!(!outcome.outputs[0].written);
        assert!(outcome.outputs[0].error.is_none());
        assert!(!outputs_dir.join("never.txt").exists());
    }

    #[tokio::test]
    async fn test_output_referencing_failed_step_not_written() {
        let dir = TempDir::new().unwrap();
        let outputs_dir = dir.path().join("outputs");

        let spec = parse_workflow(
            r#"
name: gated
processing_steps:
  - name: doomed
    prompt_template: "POISON"
  - name: fine
    prompt_template: "works"
outputs:
  - type: text
    filename: "report.txt"
    content: "Recommendation: {{ doomed.rawText }}"
  - type: text
    filename: "fine.txt"
    content: "{{ fine.rawText }}"
"#,
        )
        .unwrap();

        let generator = Arc::new(FailOnKeyword {
            keyword: "POISON",
            calls: AtomicUsize::new(0),
        });
        let engine = engine_with(generator, &outputs_dir);
        let outcome = engine.run(&spec, &HashMap::new()).await.unwrap();

        // The output reading the failed step is skipped without error,
        // never written with failure text substituted in.
        assert!(!outcome.outputs[0].written);
        assert!(outcome.outputs[0].error.is_none());
        assert!(!outputs_dir.join("report.txt").exists());
        // Outputs of successful steps still land.
        assert!(outcome.outputs[1].written);
        assert!(outputs_dir.join("fine.txt").exists());
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_unreachable_data_source_aborts_before_steps() {
        let dir = TempDir::new().unwrap();

        let spec = parse_workflow(
            r#"
name: unreachable
databases:
  meters: /nonexistent/meters.db
processing_steps:
  - name: a
    prompt_template: "{{ meters.get_all() }}"
"#,
        )
        .unwrap();

        let generator = Arc::new(FailOnKeyword {
            keyword: "never",
            calls: AtomicUsize::new(0),
        });
        let engine = engine_with(generator.clone(), dir.path());
        let err = engine.run(&spec, &HashMap::new()).await.unwrap_err();

        assert_eq!(err.code(), "DATA_SOURCE_UNREACHABLE");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_workflow_rejected_up_front() {
        let spec = parse_workflow(
            r#"
name: invalid
processing_steps:
  - name: a
    prompt_template: "{{ missing_input }}"
"#,
        )
        .unwrap();

        let dir = TempDir::new().unwrap();
        let engine = engine_with(
            Arc::new(FailOnKeyword {
                keyword: "x",
                calls: AtomicUsize::new(0),
            }),
            dir.path(),
        );
        let err = engine.run(&spec, &HashMap::new()).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_spreadsheet_output_from_step_data() {
        let dir = TempDir::new().unwrap();
        let outputs_dir = dir.path().join("outputs");

        let spec = parse_workflow(
            r#"
name: report
processing_steps:
  - name: analyze
    prompt_template: "Recommend something"
outputs:
  - type: spreadsheet
    filename: "report.csv"
    data:
      summary:
        workflow: report
        model: "{{ analyze.parsedValue.model }}"
      table:
        columns: [field, value]
        rows:
          - ["accuracy", "{{ analyze.parsedValue.accuracy }}"]
"#,
        )
        .unwrap();

        let engine = engine_with(Arc::new(KeywordGenerator), &outputs_dir);
        let outcome = engine.run(&spec, &HashMap::new()).await.unwrap();

        assert!(outcome.success, "{:?}", outcome.outputs);
        let body =
            std::fs::read_to_string(outcome.outputs[0].path.as_ref().unwrap()).unwrap();
        assert!(body.contains("model,PM5320"), "{}", body);
        assert!(body.contains("accuracy,±0.5%"), "{}", body);
    }

    #[test]
    fn test_run_context_shape() {
        let run = RunContext::new();
        assert_eq!(run.timestamp.len(), 15);
        assert!(run.timestamp.contains('_'));
        assert_eq!(run.run_id.len(), 36);
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = PipelineOutcome {
            workflow: "w".to_string(),
            run_id: "r".to_string(),
            timestamp: "t".to_string(),
            success: true,
            steps: vec![StepRecord {
                name: "a".to_string(),
                status: StepStatus::Completed,
                duration_ms: 5,
                result: None,
                reason: None,
            }],
            outputs: vec![],
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["steps"][0]["status"], json!("completed"));
    }
}
