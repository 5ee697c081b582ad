//! Rendering of output artifacts to disk.
//!
//! Three artifact kinds are supported. `json` pretty-prints either the
//! rendered data structure or, when given content that parses as JSON,
//! the parsed form. `text` writes rendered content verbatim.
//! `spreadsheet` renders a CSV report from a conventional data shape:
//! a required `summary` object and `table` section, plus an optional
//! `details` object.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::workflow::OutputKind;

/// A fully rendered artifact, ready to write.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: OutputKind,
    pub filename: String,
    pub content: Option<String>,
    pub data: Option<Value>,
}

/// Writes artifacts somewhere and returns where they landed.
pub trait OutputRenderer: Send + Sync {
    fn render(&self, artifact: &Artifact) -> Result<PathBuf>;
}

/// Renders artifacts into files under a base directory.
pub struct FileOutputRenderer {
    base_dir: PathBuf,
}

impl FileOutputRenderer {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn target_path(&self, filename: &str) -> Result<PathBuf> {
        let name = Path::new(filename);
        // Rendered filenames come from templates; keep them inside the
        // output directory.
        if name.is_absolute()
            || name
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::Render(format!(
                "output filename '{}' must be relative and must not traverse upward",
                filename
            )));
        }
        Ok(self.base_dir.join(name))
    }
}

impl OutputRenderer for FileOutputRenderer {
    fn render(&self, artifact: &Artifact) -> Result<PathBuf> {
        let path = self.target_path(&artifact.filename)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let body = match artifact.kind {
            OutputKind::Text => artifact
                .content
                .clone()
                .ok_or_else(|| Error::Render("text output has no content".to_string()))?,
            OutputKind::Json => render_json(artifact)?,
            OutputKind::Spreadsheet => render_spreadsheet(artifact)?,
        };

        fs::write(&path, body)?;
        debug!(path = %path.display(), "wrote artifact");
        Ok(path)
    }
}

fn render_json(artifact: &Artifact) -> Result<String> {
    let value = match (&artifact.data, &artifact.content) {
        (Some(data), _) => data.clone(),
        (None, Some(content)) => {
            // Content that parses as JSON is written in canonical pretty
            // form; anything else is wrapped as a JSON string.
            serde_json::from_str(content).unwrap_or(Value::String(content.clone()))
        }
        (None, None) => {
            return Err(Error::Render(
                "json output has neither data nor content".to_string(),
            ))
        }
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

/// CSV report layout: summary key/value block, blank line, the table
/// with a header row, then an optional details block.
fn render_spreadsheet(artifact: &Artifact) -> Result<String> {
    let data = artifact
        .data
        .as_ref()
        .ok_or_else(|| Error::Render("spreadsheet output has no data".to_string()))?;
    let data = data
        .as_object()
        .ok_or_else(|| Error::Render("spreadsheet data must be an object".to_string()))?;

    let summary = data
        .get("summary")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Render("spreadsheet data requires a 'summary' object".to_string()))?;
    let table = data
        .get("table")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Render("spreadsheet data requires a 'table' section".to_string()))?;

    let columns = table
        .get("columns")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Render("'table' requires a 'columns' list".to_string()))?;
    let rows = table
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Render("'table' requires a 'rows' list".to_string()))?;

    let mut out = String::new();

    for (key, value) in summary {
        out.push_str(&csv_row(&[key.clone(), cell_text(value)]));
    }
    out.push('\n');

    let header: Vec<String> = columns.iter().map(cell_text).collect();
    out.push_str(&csv_row(&header));
    for row in rows {
        let cells: Vec<String> = match row {
            Value::Array(items) => items.iter().map(cell_text).collect(),
            // Object rows are projected through the declared columns.
            Value::Object(map) => columns
                .iter()
                .map(|c| map.get(cell_text(c).as_str()).map(cell_text).unwrap_or_default())
                .collect(),
            other => vec![cell_text(other)],
        };
        out.push_str(&csv_row(&cells));
    }

    if let Some(details) = data.get("details").and_then(Value::as_object) {
        out.push('\n');
        for (key, value) in details {
            out.push_str(&csv_row(&[key.clone(), cell_text(value)]));
        }
    }

    Ok(out)
}

/// Cell text for CSV: strings and nulls unquoted, everything else as
/// compact JSON.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn csv_row(cells: &[String]) -> String {
    let escaped: Vec<String> = cells.iter().map(|c| csv_escape(c)).collect();
    format!("{}\n", escaped.join(","))
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn renderer(dir: &TempDir) -> FileOutputRenderer {
        FileOutputRenderer::new(dir.path())
    }

    #[test]
    fn test_text_written_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = renderer(&dir)
            .render(&Artifact {
                kind: OutputKind::Text,
                filename: "report.txt".to_string(),
                content: Some("line one\nline two".to_string()),
                data: None,
            })
            .unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "line one\nline two");
    }

    #[test]
    fn test_json_content_reformatted_when_parseable() {
        let dir = TempDir::new().unwrap();
        let path = renderer(&dir)
            .render(&Artifact {
                kind: OutputKind::Json,
                filename: "out.json".to_string(),
                content: Some(r#"{"a":1,"b":[2,3]}"#.to_string()),
                data: None,
            })
            .unwrap();
        let parsed: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, json!({"a": 1, "b": [2, 3]}));
    }

    #[test]
    fn test_json_non_json_content_wrapped_as_string() {
        let dir = TempDir::new().unwrap();
        let path = renderer(&dir)
            .render(&Artifact {
                kind: OutputKind::Json,
                filename: "out.json".to_string(),
                content: Some("not json".to_string()),
                data: None,
            })
            .unwrap();
        let parsed: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, json!("not json"));
    }

    #[test]
    fn test_spreadsheet_layout() {
        let dir = TempDir::new().unwrap();
        let path = renderer(&dir)
            .render(&Artifact {
                kind: OutputKind::Spreadsheet,
                filename: "report.csv".to_string(),
                content: None,
                data: Some(json!({
                    "summary": {"workflow": "accuracy", "steps": 2},
                    "table": {
                        "columns": ["model", "accuracy"],
                        "rows": [["PM5560", "±0.2%"], ["PM5320", "±0.5%"]]
                    },
                    "details": {"note": "values include, commas"}
                })),
            })
            .unwrap();

        let body = fs::read_to_string(path).unwrap();
        assert!(body.starts_with("workflow,accuracy\nsteps,2\n\n"));
        assert!(body.contains("model,accuracy\nPM5560,±0.2%\nPM5320,±0.5%\n"));
        assert!(body.contains("note,\"values include, commas\""));
    }

    #[test]
    fn test_spreadsheet_object_rows_follow_columns() {
        let dir = TempDir::new().unwrap();
        let path = renderer(&dir)
            .render(&Artifact {
                kind: OutputKind::Spreadsheet,
                filename: "r.csv".to_string(),
                content: None,
                data: Some(json!({
                    "summary": {"n": 1},
                    "table": {
                        "columns": ["b", "a"],
                        "rows": [{"a": "A1", "b": "B1"}]
                    }
                })),
            })
            .unwrap();
        assert!(fs::read_to_string(path).unwrap().contains("b,a\nB1,A1\n"));
    }

    #[test]
    fn test_spreadsheet_missing_summary_fails() {
        let dir = TempDir::new().unwrap();
        let err = renderer(&dir)
            .render(&Artifact {
                kind: OutputKind::Spreadsheet,
                filename: "r.csv".to_string(),
                content: None,
                data: Some(json!({"table": {"columns": [], "rows": []}})),
            })
            .unwrap_err();
        assert_eq!(err.code(), "RENDER_ERROR");
    }

    #[test]
    fn test_filename_cannot_traverse_upward() {
        let dir = TempDir::new().unwrap();
        let err = renderer(&dir)
            .render(&Artifact {
                kind: OutputKind::Text,
                filename: "../escape.txt".to_string(),
                content: Some("x".to_string()),
                data: None,
            })
            .unwrap_err();
        assert_eq!(err.code(), "RENDER_ERROR");
    }

    #[test]
    fn test_subdirectory_created() {
        let dir = TempDir::new().unwrap();
        let path = renderer(&dir)
            .render(&Artifact {
                kind: OutputKind::Text,
                filename: "nested/run/report.txt".to_string(),
                content: Some("x".to_string()),
                data: None,
            })
            .unwrap();
        assert!(path.exists());
    }
}
