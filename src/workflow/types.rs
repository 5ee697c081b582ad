//! Workflow description types.
//!
//! The YAML field names and nesting here are a compatibility contract that
//! workflow authors rely on; they must be preserved exactly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A complete workflow description.
///
/// # Example YAML
///
/// ```yaml
/// name: accuracy-analysis
/// description: Extract accuracy requirements and match meters
///
/// inputs:
///   - name: document
///     type: file
///     required: true
///     formats: [txt, md]
///
/// databases:
///   meters: databases/meters.db
///
/// processing_steps:
///   - name: extract_clauses
///     prompt_template: |
///       Extract the accuracy clauses from: {{ document.content }}
///   - name: recommend
///     dependencies: [extract_clauses]
///     timeout: 120
///     prompt_template: |
///       Clauses: {{ extract_clauses.parsedValue }}
///       Meters: {{ meters.get_all() }}
///
/// outputs:
///   - type: json
///     filename: "recommendations_{{ timestamp }}.json"
///     content: "{{ recommend.rawText }}"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    /// Unique workflow name (used as identifier).
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Declared inputs, in declaration order.
    #[serde(default)]
    pub inputs: Vec<InputDecl>,

    /// Data source name -> connection locator (SQLite path).
    #[serde(default)]
    pub databases: BTreeMap<String, String>,

    /// Processing steps, in declaration order.
    #[serde(default)]
    pub processing_steps: Vec<StepDecl>,

    /// Output declarations, evaluated after all required steps finish.
    #[serde(default)]
    pub outputs: Vec<OutputDecl>,
}

/// Kind of a declared input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// A document loaded through the DocumentLoader.
    File,
    /// Free text.
    Text,
    /// One of a fixed set of options.
    Option,
    /// A number.
    Number,
}

/// A declared workflow input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDecl {
    /// Unique input name; referenced from templates as `{{ name }}`.
    pub name: String,

    /// Input kind.
    #[serde(rename = "type")]
    pub kind: InputKind,

    /// Whether the input must be provided (or have a default).
    #[serde(default)]
    pub required: bool,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Default value applied when the input is absent.
    #[serde(default)]
    pub default: Option<serde_json::Value>,

    /// Allowed file extensions (file inputs only, without the dot).
    #[serde(default)]
    pub formats: Vec<String>,

    /// Allowed values (option inputs only).
    #[serde(default)]
    pub options: Vec<String>,
}

/// One named processing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDecl {
    /// Unique step name; doubles as the result-binding identifier.
    pub name: String,

    /// Names of earlier steps this step depends on. Forward and self
    /// references are validation errors.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Prompt template rendered against inputs, data sources, and the
    /// results of declared dependencies.
    pub prompt_template: String,

    /// Per-step timeout in seconds (engine default when absent).
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Kind of output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Json,
    Text,
    Spreadsheet,
}

/// A declared output artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDecl {
    /// Output kind.
    #[serde(rename = "type")]
    pub kind: OutputKind,

    /// Filename template.
    pub filename: String,

    /// Content as a single template string.
    #[serde(default)]
    pub content: Option<String>,

    /// Content as a nested structure; template strings inside it are
    /// rendered recursively.
    #[serde(default)]
    pub data: Option<serde_json::Value>,

    /// Boolean template; the output is emitted only when it renders truthy.
    #[serde(default)]
    pub condition: Option<String>,
}

impl WorkflowSpec {
    /// Get a step by name.
    pub fn get_step(&self, name: &str) -> Option<&StepDecl> {
        self.processing_steps.iter().find(|s| s.name == name)
    }

    /// Get a declared input by name.
    pub fn get_input(&self, name: &str) -> Option<&InputDecl> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

impl OutputDecl {
    /// All template strings this output evaluates, for reference scanning.
    pub fn template_strings(&self) -> Vec<&str> {
        let mut templates = vec![self.filename.as_str()];
        if let Some(content) = &self.content {
            templates.push(content);
        }
        if let Some(data) = &self.data {
            collect_template_strings(data, &mut templates);
        }
        if let Some(condition) = &self.condition {
            templates.push(condition);
        }
        templates
    }
}

fn collect_template_strings<'a>(value: &'a serde_json::Value, out: &mut Vec<&'a str>) {
    match value {
        serde_json::Value::String(s) => out.push(s),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_template_strings(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_template_strings(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_kind_snake_case() {
        let decl: InputDecl = serde_yaml::from_str("name: doc\ntype: file\n").unwrap();
        assert_eq!(decl.kind, InputKind::File);
        assert!(!decl.required);
    }

    #[test]
    fn test_output_template_strings_include_nested_data() {
        let output = OutputDecl {
            kind: OutputKind::Json,
            filename: "out_{{ timestamp }}.json".to_string(),
            content: None,
            data: Some(serde_json::json!({
                "summary": "{{ analyze.rawText }}",
                "rows": ["{{ analyze.success }}"]
            })),
            condition: Some("{{ analyze.success }}".to_string()),
        };

        let templates = output.template_strings();
        assert!(templates.iter().any(|t| t.contains("analyze.rawText")));
        assert!(templates.iter().any(|t| t.contains("analyze.success")));
        assert!(templates.contains(&"out_{{ timestamp }}.json"));
    }
}
