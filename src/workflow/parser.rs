//! Workflow YAML parser.

use std::path::Path;

use super::types::WorkflowSpec;
use crate::error::{Error, Result};

/// Parse a workflow description from a YAML string.
pub fn parse_workflow(yaml: &str) -> Result<WorkflowSpec> {
    if yaml.trim().is_empty() {
        return Err(Error::Parse("Empty workflow description".to_string()));
    }

    let spec: WorkflowSpec = serde_yaml::from_str(yaml).map_err(|e| {
        let msg = e.to_string();
        if let Some(field) = extract_missing_field(&msg) {
            Error::Parse(format!("Missing required field: {}", field))
        } else {
            Error::Parse(format!("Invalid YAML: {}", msg))
        }
    })?;
    Ok(spec)
}

/// Parse a workflow description from a file path.
pub fn parse_workflow_file(path: impl AsRef<Path>) -> Result<WorkflowSpec> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_workflow(&content)
}

fn extract_missing_field(error_message: &str) -> Option<&str> {
    let marker = "missing field `";
    let start = error_message.find(marker)? + marker.len();
    let rest = &error_message[start..];
    let end = rest.find('`')?;
    Some(&rest[..end])
}
