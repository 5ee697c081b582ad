//! Workflow validation.
//!
//! Runs before anything executes and reports every violation found, not
//! just the first. Checks:
//! - required fields, name uniqueness, namespace collisions
//! - dependency sanity (declared, earlier-only, acyclic)
//! - the reference closure of every template (inputs, data sources,
//!   declared dependencies, capability calls with valid arity)
//! - output declarations are renderable for their kind

use std::collections::HashSet;

use super::types::{InputKind, OutputKind, StepDecl, WorkflowSpec};
use crate::error::{Error, Result};
use crate::schema::CapabilityKind;
use crate::template::{self, Expr, ValueExpr};

/// Built-in template variables available in every context.
const BUILTIN_VARS: &[&str] = &["timestamp", "run_id"];

/// Validate a workflow description.
pub fn validate_workflow(spec: &WorkflowSpec) -> Result<()> {
    let mut violations = Vec::new();

    if spec.name.is_empty() {
        violations.push("workflow name is required".to_string());
    } else if !spec
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        violations.push(format!(
            "workflow name '{}' may contain only alphanumeric characters, hyphens, and underscores",
            spec.name
        ));
    }

    if spec.processing_steps.is_empty() {
        violations.push("workflow must declare at least one processing step".to_string());
    }

    check_names(spec, &mut violations);
    check_inputs(spec, &mut violations);
    check_dependencies(spec, &mut violations);
    check_cycles(spec, &mut violations);
    check_step_references(spec, &mut violations);
    check_outputs(spec, &mut violations);

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(violations))
    }
}

fn check_names(spec: &WorkflowSpec, violations: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for input in &spec.inputs {
        if input.name.is_empty() {
            violations.push("input name cannot be empty".to_string());
        } else if !seen.insert(input.name.clone()) {
            violations.push(format!("duplicate input name '{}'", input.name));
        }
    }

    let mut step_names = HashSet::new();
    for step in &spec.processing_steps {
        if step.name.is_empty() {
            violations.push("step name cannot be empty".to_string());
        } else if !step_names.insert(step.name.clone()) {
            violations.push(format!("duplicate step name '{}'", step.name));
        }
    }

    // Inputs, data sources, and step results share the template namespace;
    // a collision would make references ambiguous.
    for step in &spec.processing_steps {
        if seen.contains(&step.name) {
            violations.push(format!(
                "step '{}' collides with an input of the same name",
                step.name
            ));
        }
        if spec.databases.contains_key(&step.name) {
            violations.push(format!(
                "step '{}' collides with a data source of the same name",
                step.name
            ));
        }
    }
    for source in spec.databases.keys() {
        if seen.contains(source) {
            violations.push(format!(
                "data source '{}' collides with an input of the same name",
                source
            ));
        }
        if BUILTIN_VARS.contains(&source.as_str()) {
            violations.push(format!("data source '{}' shadows a built-in variable", source));
        }
    }
    for input in &spec.inputs {
        if BUILTIN_VARS.contains(&input.name.as_str()) {
            violations.push(format!("input '{}' shadows a built-in variable", input.name));
        }
    }
}

fn check_inputs(spec: &WorkflowSpec, violations: &mut Vec<String>) {
    for input in &spec.inputs {
        match input.kind {
            InputKind::Option => {
                if input.options.is_empty() {
                    violations.push(format!(
                        "option input '{}' must declare its allowed options",
                        input.name
                    ));
                }
            }
            InputKind::File => {}
            _ => {
                if !input.formats.is_empty() {
                    violations.push(format!(
                        "input '{}' declares formats but is not a file input",
                        input.name
                    ));
                }
            }
        }
    }
}

fn check_dependencies(spec: &WorkflowSpec, violations: &mut Vec<String>) {
    let mut earlier: HashSet<&str> = HashSet::new();
    let all: HashSet<&str> = spec
        .processing_steps
        .iter()
        .map(|s| s.name.as_str())
        .collect();

    for step in &spec.processing_steps {
        for dep in &step.dependencies {
            if dep == &step.name {
                violations.push(format!("step '{}' depends on itself", step.name));
            } else if !all.contains(dep.as_str()) {
                violations.push(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.name, dep
                ));
            } else if !earlier.contains(dep.as_str()) {
                violations.push(format!(
                    "step '{}' has a forward reference to step '{}'; dependencies must be declared earlier",
                    step.name, dep
                ));
            }
        }
        earlier.insert(&step.name);
    }
}

fn check_cycles(spec: &WorkflowSpec, violations: &mut Vec<String>) {
    // The earlier-only rule already precludes cycles among valid edges, but
    // a spec full of forward references deserves the clearer diagnosis.
    if let Some(cycle) = super::dag::find_cycle(&spec.processing_steps) {
        violations.push(format!("dependency cycle involving: {}", cycle.join(" -> ")));
    }
}

fn check_step_references(spec: &WorkflowSpec, violations: &mut Vec<String>) {
    let step_names: HashSet<&str> = spec
        .processing_steps
        .iter()
        .map(|s| s.name.as_str())
        .collect();

    for step in &spec.processing_steps {
        let deps: HashSet<&str> = step.dependencies.iter().map(|d| d.as_str()).collect();
        let refs = match template::scan_references(&step.prompt_template) {
            Ok(refs) => refs,
            Err(e) => {
                violations.push(format!("step '{}': {}", step.name, e));
                continue;
            }
        };

        for reference in refs {
            check_reference(spec, &step_names, Some((step, &deps)), &reference, violations);
        }
    }
}

fn check_outputs(spec: &WorkflowSpec, violations: &mut Vec<String>) {
    let step_names: HashSet<&str> = spec
        .processing_steps
        .iter()
        .map(|s| s.name.as_str())
        .collect();

    for (index, output) in spec.outputs.iter().enumerate() {
        let renderable = match output.kind {
            OutputKind::Json => output.content.is_some() || output.data.is_some(),
            OutputKind::Text => output.content.is_some(),
            OutputKind::Spreadsheet => output.data.is_some(),
        };
        if !renderable {
            violations.push(format!(
                "output #{} ({:?}) declares neither usable content nor data",
                index + 1,
                output.kind
            ));
        }

        for template_str in output.template_strings() {
            match template::scan_references(template_str) {
                Ok(refs) => {
                    for reference in refs {
                        check_reference(spec, &step_names, None, &reference, violations);
                    }
                }
                Err(e) => violations.push(format!("output #{}: {}", index + 1, e)),
            }
        }
    }
}

/// Check one scanned reference against what its context may legally see.
///
/// `step` is `None` for outputs, which run after every step and may
/// therefore reference any of them.
fn check_reference(
    spec: &WorkflowSpec,
    step_names: &HashSet<&str>,
    step: Option<(&StepDecl, &HashSet<&str>)>,
    reference: &Expr,
    violations: &mut Vec<String>,
) {
    let location = match step {
        Some((s, _)) => format!("step '{}'", s.name),
        None => "output".to_string(),
    };

    match reference {
        Expr::Path(path) => {
            check_path(spec, step_names, step, &location, path, violations);
        }
        Expr::Call { source, op, args } => {
            if !spec.databases.contains_key(source) {
                violations.push(format!(
                    "{}: capability call on unknown data source '{}'",
                    location, source
                ));
                return;
            }
            match CapabilityKind::from_name(op) {
                None => violations.push(format!(
                    "{}: data source '{}' has no operation '{}'",
                    location, source, op
                )),
                Some(kind) => {
                    let positional = args.iter().filter(|a| a.name.is_none()).count();
                    let named = args.len() - positional;
                    if let Err(msg) = kind.check_shape(positional, named) {
                        violations.push(format!("{}: {}", location, msg));
                    }
                }
            }
            // Call arguments may reference context variables; those paths
            // obey the same visibility rules as bare references.
            for arg in args {
                if let ValueExpr::Path(path) = &arg.value {
                    check_path(spec, step_names, step, &location, path, violations);
                }
            }
        }
    }
}

fn check_path(
    spec: &WorkflowSpec,
    step_names: &HashSet<&str>,
    step: Option<(&StepDecl, &HashSet<&str>)>,
    location: &str,
    path: &[String],
    violations: &mut Vec<String>,
) {
    let head = path[0].as_str();
    if BUILTIN_VARS.contains(&head) || spec.get_input(head).is_some() {
        return;
    }
    if spec.databases.contains_key(head) {
        violations.push(format!(
            "{}: data source '{}' can only be used through a capability call",
            location, head
        ));
        return;
    }
    if step_names.contains(head) {
        match step {
            // Referencing a step's result requires declaring the
            // dependency; implicit data flow is not guessed at.
            Some((s, deps)) if !deps.contains(head) => {
                violations.push(format!(
                    "step '{}' references step '{}' without declaring it as a dependency",
                    s.name, head
                ));
            }
            _ => {}
        }
        return;
    }
    violations.push(format!(
        "{}: reference '{}' does not resolve to an input, data source, or dependency",
        location,
        path.join(".")
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::parser::parse_workflow;

    fn violations_of(yaml: &str) -> Vec<String> {
        match validate_workflow(&parse_workflow(yaml).unwrap()) {
            Ok(()) => Vec::new(),
            Err(Error::Validation(v)) => v,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_valid_workflow_passes() {
        let yaml = r#"
name: analysis
inputs:
  - name: document
    type: text
databases:
  meters: meters.db
processing_steps:
  - name: extract
    prompt_template: "Extract from {{ document }} using {{ meters.get_all() }}"
  - name: recommend
    dependencies: [extract]
    prompt_template: "Given {{ extract.parsedValue }} at {{ timestamp }}"
outputs:
  - type: text
    filename: "out_{{ timestamp }}.txt"
    content: "{{ recommend.rawText }}"
"#;
        assert!(violations_of(yaml).is_empty());
    }

    #[test]
    fn test_all_violations_reported_not_just_first() {
        let yaml = r#"
name: "bad name!"
processing_steps:
  - name: a
    prompt_template: "{{ nosuch }}"
  - name: a
    prompt_template: "{{ alsomissing }}"
"#;
        let violations = violations_of(yaml);
        assert!(violations.len() >= 3, "got: {:?}", violations);
        assert!(violations.iter().any(|v| v.contains("duplicate step name")));
        assert!(violations.iter().any(|v| v.contains("nosuch")));
        assert!(violations.iter().any(|v| v.contains("alsomissing")));
    }

    #[test]
    fn test_forward_reference_rejected() {
        let yaml = r#"
name: test
processing_steps:
  - name: first
    dependencies: [second]
    prompt_template: "x"
  - name: second
    prompt_template: "y"
"#;
        let violations = violations_of(yaml);
        assert!(violations.iter().any(|v| v.contains("forward reference")));
    }

    #[test]
    fn test_cycle_rejected() {
        let yaml = r#"
name: test
processing_steps:
  - name: a
    dependencies: [b]
    prompt_template: "x"
  - name: b
    dependencies: [a]
    prompt_template: "y"
"#;
        let violations = violations_of(yaml);
        assert!(violations.iter().any(|v| v.contains("cycle")), "{:?}", violations);
    }

    #[test]
    fn test_undeclared_dependency_reference_rejected() {
        let yaml = r#"
name: test
processing_steps:
  - name: extract
    prompt_template: "x"
  - name: recommend
    prompt_template: "uses {{ extract.rawText }}"
"#;
        let violations = violations_of(yaml);
        assert!(violations
            .iter()
            .any(|v| v.contains("without declaring it as a dependency")));
    }

    #[test]
    fn test_bare_data_source_reference_rejected() {
        let yaml = r#"
name: test
databases:
  meters: meters.db
processing_steps:
  - name: a
    prompt_template: "{{ meters }}"
"#;
        let violations = violations_of(yaml);
        assert!(violations
            .iter()
            .any(|v| v.contains("capability call")));
    }

    #[test]
    fn test_capability_arity_checked_statically() {
        let yaml = r#"
name: test
databases:
  meters: meters.db
processing_steps:
  - name: a
    prompt_template: "{{ meters.get_by_series() }}"
  - name: b
    prompt_template: "{{ meters.explode(1) }}"
"#;
        let violations = violations_of(yaml);
        assert!(violations
            .iter()
            .any(|v| v.contains("exactly one series value")));
        assert!(violations.iter().any(|v| v.contains("no operation 'explode'")));
    }

    #[test]
    fn test_call_argument_must_resolve() {
        let yaml = r#"
name: test
databases:
  meters: meters.db
processing_steps:
  - name: a
    prompt_template: "{{ meters.get_by_series(nosuch_var) }}"
"#;
        let violations = violations_of(yaml);
        assert!(
            violations
                .iter()
                .any(|v| v.contains("nosuch_var") && v.contains("does not resolve")),
            "{:?}",
            violations
        );
    }

    #[test]
    fn test_call_argument_step_reference_requires_dependency() {
        let yaml = r#"
name: test
databases:
  meters: meters.db
processing_steps:
  - name: first
    prompt_template: "x"
  - name: second
    prompt_template: "{{ meters.get_by_series(first.rawText) }}"
"#;
        let violations = violations_of(yaml);
        assert!(
            violations
                .iter()
                .any(|v| v.contains("without declaring it as a dependency")),
            "{:?}",
            violations
        );
    }

    #[test]
    fn test_call_argument_input_reference_accepted() {
        let yaml = r#"
name: test
inputs:
  - name: series
    type: text
databases:
  meters: meters.db
processing_steps:
  - name: a
    prompt_template: "{{ meters.get_by_series(series) }}"
"#;
        assert!(violations_of(yaml).is_empty());
    }

    #[test]
    fn test_output_referencing_any_step_is_fine() {
        let yaml = r#"
name: test
processing_steps:
  - name: a
    prompt_template: "x"
  - name: b
    prompt_template: "y"
outputs:
  - type: text
    filename: "out.txt"
    content: "{{ a.rawText }} {{ b.rawText }}"
"#;
        assert!(violations_of(yaml).is_empty());
    }

    #[test]
    fn test_spreadsheet_without_data_rejected() {
        let yaml = r#"
name: test
processing_steps:
  - name: a
    prompt_template: "x"
outputs:
  - type: spreadsheet
    filename: "out.csv"
    content: "{{ a.rawText }}"
"#;
        let violations = violations_of(yaml);
        assert!(violations.iter().any(|v| v.contains("neither usable content nor data")));
    }

    #[test]
    fn test_option_input_requires_options() {
        let yaml = r#"
name: test
inputs:
  - name: mode
    type: option
processing_steps:
  - name: a
    prompt_template: "{{ mode }}"
"#;
        let violations = violations_of(yaml);
        assert!(violations.iter().any(|v| v.contains("allowed options")));
    }
}
