//! Capability registry: the catalog of operations templates may invoke.
//!
//! Accessor dispatch is a fixed, closed set of operation variants rather
//! than free-form reflection; each variant declares its calling convention
//! statically so templates can be checked before anything executes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::accessor::{QueryAccessor, Record};
use crate::error::{Error, Result};

/// The closed set of operations a data source exposes to templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    GetAll,
    GetBySeries,
    Search,
    RawQuery,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 4] = [
        CapabilityKind::GetAll,
        CapabilityKind::GetBySeries,
        CapabilityKind::Search,
        CapabilityKind::RawQuery,
    ];

    /// Template-facing operation name.
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityKind::GetAll => "get_all",
            CapabilityKind::GetBySeries => "get_by_series",
            CapabilityKind::Search => "search",
            CapabilityKind::RawQuery => "raw_query",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            CapabilityKind::GetAll => "All rows of a table (main table when omitted)",
            CapabilityKind::GetBySeries => "Rows whose series column matches exactly",
            CapabilityKind::Search => "Rows matching every given column=value criterion",
            CapabilityKind::RawQuery => "Parameterized read-only SQL passthrough",
        }
    }

    pub fn example(&self) -> &'static str {
        match self {
            CapabilityKind::GetAll => "{{ meters.get_all() }}",
            CapabilityKind::GetBySeries => "{{ meters.get_by_series(\"PM5000\") }}",
            CapabilityKind::Search => "{{ meters.search(series_name=\"PM5000\") }}",
            CapabilityKind::RawQuery => {
                "{{ meters.raw_query(\"SELECT model_name FROM Meters WHERE id = ?\", 1) }}"
            }
        }
    }

    /// Check a call shape (positional count, named argument presence)
    /// against this operation's calling convention.
    pub fn check_shape(&self, positional: usize, named: usize) -> std::result::Result<(), String> {
        match self {
            CapabilityKind::GetAll => {
                if named > 0 {
                    Err("get_all takes no named arguments".to_string())
                } else if positional > 1 {
                    Err(format!(
                        "get_all takes at most one table name, got {} arguments",
                        positional
                    ))
                } else {
                    Ok(())
                }
            }
            CapabilityKind::GetBySeries => {
                if named > 0 || positional != 1 {
                    Err("get_by_series takes exactly one series value".to_string())
                } else {
                    Ok(())
                }
            }
            CapabilityKind::Search => {
                if positional > 0 || named == 0 {
                    Err("search takes one or more column=value arguments".to_string())
                } else {
                    Ok(())
                }
            }
            CapabilityKind::RawQuery => {
                if named > 0 {
                    Err("raw_query takes no named arguments".to_string())
                } else if positional == 0 {
                    Err("raw_query requires a query string".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Catalog entry describing one capability's calling convention.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilitySpec {
    pub description: String,
    pub params: String,
    pub example: String,
}

/// A resolved call argument, positional or named.
#[derive(Debug, Clone)]
pub enum CallArg {
    Positional(Value),
    Named(String, Value),
}

/// Per-data-source accessor catalog.
///
/// Registered once per run by the engine; the template resolver validates
/// and dispatches capability calls through it.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    sources: HashMap<String, Arc<QueryAccessor>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data source under the name templates use.
    pub fn register(&mut self, source_name: &str, accessor: QueryAccessor) {
        self.sources
            .insert(source_name.to_string(), Arc::new(accessor));
    }

    pub fn contains(&self, source_name: &str) -> bool {
        self.sources.contains_key(source_name)
    }

    pub fn source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    pub fn accessor(&self, source_name: &str) -> Option<&Arc<QueryAccessor>> {
        self.sources.get(source_name)
    }

    /// The operation catalog for one source.
    pub fn list_capabilities(
        &self,
        source_name: &str,
    ) -> Result<BTreeMap<&'static str, CapabilitySpec>> {
        if !self.contains(source_name) {
            return Err(Error::UnresolvedReference(format!(
                "unknown data source '{}'",
                source_name
            )));
        }

        Ok(CapabilityKind::ALL
            .iter()
            .map(|kind| {
                (
                    kind.name(),
                    CapabilitySpec {
                        description: kind.description().to_string(),
                        params: param_summary(*kind).to_string(),
                        example: kind.example().to_string(),
                    },
                )
            })
            .collect())
    }

    /// Validate and dispatch one capability call.
    pub fn invoke(&self, source_name: &str, op: &str, args: &[CallArg]) -> Result<Vec<Record>> {
        let accessor = self.sources.get(source_name).ok_or_else(|| {
            Error::UnresolvedReference(format!("unknown data source '{}'", source_name))
        })?;

        let kind = CapabilityKind::from_name(op).ok_or_else(|| {
            Error::UnresolvedReference(format!(
                "data source '{}' has no operation '{}'",
                source_name, op
            ))
        })?;

        let positional: Vec<&Value> = args
            .iter()
            .filter_map(|a| match a {
                CallArg::Positional(v) => Some(v),
                CallArg::Named(_, _) => None,
            })
            .collect();
        let named: Vec<(&String, &Value)> = args
            .iter()
            .filter_map(|a| match a {
                CallArg::Named(name, v) => Some((name, v)),
                CallArg::Positional(_) => None,
            })
            .collect();

        kind.check_shape(positional.len(), named.len())
            .map_err(Error::TemplateSyntax)?;

        match kind {
            CapabilityKind::GetAll => {
                let table = positional.first().map(|v| value_as_str(v, "table name")).transpose()?;
                accessor.get_all(table.as_deref())
            }
            CapabilityKind::GetBySeries => {
                let series = value_as_str(positional[0], "series value")?;
                accessor.get_by_series(&series)
            }
            CapabilityKind::Search => {
                let mut criteria = Record::new();
                for (name, value) in named {
                    criteria.insert(name.clone(), value.clone());
                }
                accessor.search(&criteria)
            }
            CapabilityKind::RawQuery => {
                let sql = value_as_str(positional[0], "query string")?;
                let params: Vec<Value> =
                    positional[1..].iter().map(|v| (*v).clone()).collect();
                accessor.raw_query(&sql, &params)
            }
        }
    }
}

fn param_summary(kind: CapabilityKind) -> &'static str {
    match kind {
        CapabilityKind::GetAll => "(table?)",
        CapabilityKind::GetBySeries => "(series)",
        CapabilityKind::Search => "(column=value, ...)",
        CapabilityKind::RawQuery => "(sql, params...)",
    }
}

fn value_as_str(value: &Value, what: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(Error::TemplateSyntax(format!(
            "expected a string for {}, got {}",
            what, other
        ))),
    }
}
