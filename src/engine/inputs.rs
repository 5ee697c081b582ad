//! Resolution of user-supplied input values against a workflow's
//! declared inputs.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::loader::DocumentLoader;
use crate::template::VarMap;
use crate::workflow::{InputDecl, InputKind, WorkflowSpec};

/// Resolve raw input values (as strings, typically from the command line)
/// into typed template variables. All problems are collected so the user
/// sees every bad input at once.
pub fn resolve_inputs(
    spec: &WorkflowSpec,
    provided: &HashMap<String, String>,
    loader: &dyn DocumentLoader,
) -> Result<VarMap> {
    let mut vars = VarMap::new();
    let mut problems = Vec::new();

    for key in provided.keys() {
        if spec.get_input(key).is_none() {
            problems.push(format!("unknown input '{}'", key));
        }
    }

    for decl in &spec.inputs {
        match provided.get(&decl.name) {
            Some(raw) => match resolve_one(decl, raw, loader) {
                Ok(value) => {
                    vars.insert(decl.name.clone(), value);
                }
                Err(e) => problems.push(format!("input '{}': {}", decl.name, e)),
            },
            None => {
                if let Some(default) = &decl.default {
                    vars.insert(decl.name.clone(), default.clone());
                } else if decl.required {
                    problems.push(format!("required input '{}' was not provided", decl.name));
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(vars)
    } else {
        Err(Error::Input(problems.join("; ")))
    }
}

fn resolve_one(decl: &InputDecl, raw: &str, loader: &dyn DocumentLoader) -> Result<Value> {
    match decl.kind {
        InputKind::File => {
            let doc = loader.load(Path::new(raw), &decl.formats)?;
            Ok(doc.to_value())
        }
        InputKind::Text => Ok(Value::String(raw.to_string())),
        InputKind::Option => {
            if decl.options.iter().any(|o| o == raw) {
                Ok(Value::String(raw.to_string()))
            } else {
                Err(Error::Input(format!(
                    "'{}' is not one of: {}",
                    raw,
                    decl.options.join(", ")
                )))
            }
        }
        InputKind::Number => {
            if let Ok(n) = raw.parse::<i64>() {
                return Ok(Value::from(n));
            }
            raw.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| Error::Input(format!("'{}' is not a number", raw)))
        }
    }
}
