//! Schema auto-discovery for data sources.
//!
//! Workflow authors reference "the meters table" without knowing its
//! columns. This module inspects a live SQLite database and produces a
//! normalized, deterministic [`SchemaDescription`] that the query accessor
//! and capability registry build on.
//!
//! Relationship inference is heuristic (naming conventions) and isolated
//! here so a hand-authored override mapping could supersede it per table
//! without touching the accessor.

pub mod accessor;
pub mod registry;

pub use accessor::{QueryAccessor, Record};
pub use registry::{CapabilityKind, CapabilityRegistry, CapabilitySpec};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::SystemTime;

use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Number of rows sampled per table for format sanity, not correctness.
const SAMPLE_ROWS: usize = 3;

/// One column of a discovered table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared SQL type, as written in the schema (may be empty).
    pub declared_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnInfo {
    /// Whether the declared type is textual (used by series-column
    /// detection). An empty declared type counts as textual under SQLite
    /// affinity rules.
    pub fn is_textual(&self) -> bool {
        let ty = self.declared_type.to_ascii_uppercase();
        ty.is_empty() || ty.contains("CHAR") || ty.contains("TEXT") || ty.contains("CLOB")
    }
}

/// A discovered table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    /// Columns in declared (ordinal) order.
    pub columns: Vec<ColumnInfo>,
    /// Inferred primary key (first pk column, `id` if none declared).
    pub primary_key: String,
    pub row_count: u64,
    /// Up to [`SAMPLE_ROWS`] rows for heuristic inspection.
    pub sample_rows: Vec<Record>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// A directed relationship between two tables.
///
/// Either declared as a real foreign key or inferred from a
/// `<singular-of-table>_id` column name. Inference accepts false negatives;
/// false positives are kept rare by requiring an exact table-name match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Relationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

/// Normalized description of a data source.
///
/// Given the same schema snapshot, discovery output is identical across
/// runs: tables are sorted by name, columns by ordinal, relationships and
/// suggested queries by key. This keeps generated prompts reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub locator: String,
    pub tables: BTreeMap<String, TableInfo>,
    pub relationships: Vec<Relationship>,
    pub suggested_queries: BTreeMap<String, String>,
}

impl SchemaDescription {
    /// The "main" table: highest row count, ties broken alphabetically.
    pub fn main_table(&self) -> Option<&TableInfo> {
        self.tables
            .values()
            .max_by(|a, b| {
                a.row_count
                    .cmp(&b.row_count)
                    // BTreeMap iterates in ascending name order, so on a
                    // row-count tie keep the alphabetically first table.
                    .then_with(|| b.name.cmp(&a.name))
            })
    }
}

/// Schema discovery engine with a read-through cache.
///
/// Cache entries are keyed by locator and invalidated when the underlying
/// file's modification time changes.
#[derive(Default)]
pub struct SchemaDiscovery {
    cache: HashMap<String, (Option<SystemTime>, SchemaDescription)>,
}

impl SchemaDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover the schema of a data source, reusing a cached description
    /// when the file has not changed.
    pub fn discover(&mut self, locator: &str) -> Result<SchemaDescription> {
        let modified = file_mtime(locator);

        if let Some((cached_mtime, schema)) = self.cache.get(locator) {
            if *cached_mtime == modified && modified.is_some() {
                debug!(locator, "schema cache hit");
                return Ok(schema.clone());
            }
        }

        let schema = discover_schema(locator)?;
        info!(
            locator,
            tables = schema.tables.len(),
            relationships = schema.relationships.len(),
            "discovered schema"
        );
        self.cache
            .insert(locator.to_string(), (modified, schema.clone()));
        Ok(schema)
    }
}

fn file_mtime(locator: &str) -> Option<SystemTime> {
    std::fs::metadata(locator).and_then(|m| m.modified()).ok()
}

/// Inspect a SQLite database and build its [`SchemaDescription`].
pub fn discover_schema(locator: &str) -> Result<SchemaDescription> {
    if !Path::new(locator).exists() {
        return Err(Error::DataSourceUnreachable(format!(
            "no such database: {}",
            locator
        )));
    }

    let conn = Connection::open_with_flags(locator, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| Error::DataSourceUnreachable(format!("{}: {}", locator, e)))?;

    let mut table_names: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        names
    };
    table_names.sort();

    let mut tables = BTreeMap::new();
    let mut relationships = Vec::new();

    for name in &table_names {
        let table = analyze_table(&conn, name)?;

        // Declared foreign keys first.
        for fk in declared_foreign_keys(&conn, name)? {
            relationships.push(fk);
        }

        tables.insert(name.clone(), table);
    }

    // Then naming-convention inference over the discovered columns.
    for table in tables.values() {
        for column in &table.columns {
            if let Some(rel) = infer_relationship(table, column, &tables) {
                if !relationships.contains(&rel) {
                    relationships.push(rel);
                }
            }
        }
    }
    relationships.sort();
    relationships.dedup();

    let suggested_queries = suggest_queries(&tables, &relationships);

    Ok(SchemaDescription {
        locator: locator.to_string(),
        tables,
        relationships,
        suggested_queries,
    })
}

fn analyze_table(conn: &Connection, name: &str) -> Result<TableInfo> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(name)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get::<_, String>(1)?,
                declared_type: row.get::<_, String>(2)?,
                nullable: row.get::<_, i64>(3)? == 0,
                primary_key: row.get::<_, i64>(5)? > 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let primary_key = columns
        .iter()
        .find(|c| c.primary_key)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "id".to_string());

    let row_count: u64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(name)),
        [],
        |row| row.get(0),
    )?;

    let sample_rows = sample_table(conn, name, &columns)?;

    Ok(TableInfo {
        name: name.to_string(),
        columns,
        primary_key,
        row_count,
        sample_rows,
    })
}

fn sample_table(conn: &Connection, name: &str, columns: &[ColumnInfo]) -> Result<Vec<Record>> {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {} FROM {} LIMIT {}",
        column_list,
        quote_ident(name),
        SAMPLE_ROWS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let mut record = Record::new();
            for (i, col) in columns.iter().enumerate() {
                record.insert(col.name.clone(), accessor::sql_value_to_json(row, i));
            }
            Ok(record)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn declared_foreign_keys(conn: &Connection, table: &str) -> Result<Vec<Relationship>> {
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", quote_ident(table)))?;
    let fks = stmt
        .query_map([], |row| {
            Ok(Relationship {
                from_table: table.to_string(),
                from_column: row.get::<_, String>(3)?,
                to_table: row.get::<_, String>(2)?,
                // A FK may omit the referenced column; SQLite then means
                // the referenced table's primary key.
                to_column: row
                    .get::<_, Option<String>>(4)?
                    .unwrap_or_else(|| "id".to_string()),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(fks)
}

/// Infer a relationship from a `<singular-of-table>_id` column name.
fn infer_relationship(
    table: &TableInfo,
    column: &ColumnInfo,
    tables: &BTreeMap<String, TableInfo>,
) -> Option<Relationship> {
    let lower = column.name.to_ascii_lowercase();
    let stem = lower.strip_suffix("_id")?;
    if stem.is_empty() {
        return None;
    }

    let target = tables.values().find(|t| {
        if t.name == table.name {
            return false;
        }
        let name = t.name.to_ascii_lowercase();
        name == stem || name == format!("{}s", stem) || name == format!("{}es", stem)
    })?;

    Some(Relationship {
        from_table: table.name.clone(),
        from_column: column.name.clone(),
        to_table: target.name.clone(),
        to_column: target.primary_key.clone(),
    })
}

/// Synthesize default query strings from the discovered schema.
fn suggest_queries(
    tables: &BTreeMap<String, TableInfo>,
    relationships: &[Relationship],
) -> BTreeMap<String, String> {
    let mut queries = BTreeMap::new();

    for (name, table) in tables {
        let key = name.to_ascii_lowercase();
        let columns = table
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        queries.insert(
            format!("select_all_{}", key),
            format!(
                "SELECT {} FROM {} ORDER BY {}",
                columns,
                quote_ident(name),
                quote_ident(&table.primary_key)
            ),
        );

        if let Some(rel) = relationships.iter().find(|r| &r.from_table == name) {
            queries.insert(
                format!("select_{}_joined", key),
                format!(
                    "SELECT a.*, b.* FROM {} a JOIN {} b ON a.{} = b.{} ORDER BY a.{}",
                    quote_ident(name),
                    quote_ident(&rel.to_table),
                    quote_ident(&rel.from_column),
                    quote_ident(&rel.to_column),
                    quote_ident(&table.primary_key)
                ),
            );
        }
    }

    queries
}

/// Quote a SQL identifier. Names come from the discovered schema, but
/// quoting keeps reserved words and unusual characters safe.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Format a sample value summary for CLI inspection output.
pub fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) if s.chars().count() > 40 => {
            format!("{}…", s.chars().take(40).collect::<String>())
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build the fixture database used across schema-layer tests.
    pub(crate) fn fixture_db(dir: &tempfile::TempDir) -> String {
        let path = dir.path().join("meters.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE Meters (
                id INTEGER PRIMARY KEY,
                model_name TEXT NOT NULL,
                series_name TEXT,
                accuracy_class REAL
            );
            CREATE TABLE Specifications (
                id INTEGER PRIMARY KEY,
                meter_id INTEGER,
                parameter TEXT,
                value TEXT
            );
            INSERT INTO Meters VALUES
                (1, 'PM5560', 'PM5000', 0.2),
                (2, 'PM5320', 'PM5000', 0.5),
                (3, 'ION9000', 'ION', 0.1);
            INSERT INTO Specifications VALUES
                (1, 1, 'accuracy', '±0.2%'),
                (2, 1, 'voltage', '480V'),
                (3, 2, 'accuracy', '±0.5%'),
                (4, 3, 'accuracy', '±0.1%');
            "#,
        )
        .unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_discover_tables_columns_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_db(&dir);

        let schema = discover_schema(&path).unwrap();
        assert_eq!(schema.tables.len(), 2);

        let meters = &schema.tables["Meters"];
        assert_eq!(
            meters.column_names(),
            vec!["id", "model_name", "series_name", "accuracy_class"]
        );
        assert_eq!(meters.primary_key, "id");
        assert_eq!(meters.row_count, 3);
        assert_eq!(meters.sample_rows.len(), 3);
        assert!(!meters.column("model_name").unwrap().nullable);
        assert!(meters.column("series_name").unwrap().is_textual());
    }

    #[test]
    fn test_relationship_inferred_from_column_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_db(&dir);

        let schema = discover_schema(&path).unwrap();
        // Specifications.meter_id -> Meters.id, inferred without a declared FK.
        assert!(schema.relationships.contains(&Relationship {
            from_table: "Specifications".to_string(),
            from_column: "meter_id".to_string(),
            to_table: "Meters".to_string(),
            to_column: "id".to_string(),
        }));
    }

    #[test]
    fn test_no_false_positive_without_matching_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE readings (id INTEGER PRIMARY KEY, sensor_id INTEGER, value REAL);",
        )
        .unwrap();
        drop(conn);

        let schema = discover_schema(&path.to_string_lossy()).unwrap();
        assert!(schema.relationships.is_empty());
    }

    #[test]
    fn test_suggested_queries_cover_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_db(&dir);

        let schema = discover_schema(&path).unwrap();
        assert!(schema.suggested_queries.contains_key("select_all_meters"));
        assert!(schema
            .suggested_queries
            .contains_key("select_all_specifications"));
        // Specifications has a relationship, so it also gets a joined variant.
        let joined = &schema.suggested_queries["select_specifications_joined"];
        assert!(joined.contains("JOIN"));
        assert!(joined.contains("\"Meters\""));
    }

    #[test]
    fn test_discovery_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_db(&dir);

        let first = serde_json::to_string(&discover_schema(&path).unwrap()).unwrap();
        let second = serde_json::to_string(&discover_schema(&path).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_main_table_highest_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_db(&dir);

        let schema = discover_schema(&path).unwrap();
        // Specifications has 4 rows vs Meters' 3.
        assert_eq!(schema.main_table().unwrap().name, "Specifications");
    }

    #[test]
    fn test_main_table_tie_broken_alphabetically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tie.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE zebra (id INTEGER PRIMARY KEY);
            CREATE TABLE apple (id INTEGER PRIMARY KEY);
            INSERT INTO zebra VALUES (1);
            INSERT INTO apple VALUES (1);
            "#,
        )
        .unwrap();
        drop(conn);

        let schema = discover_schema(&path.to_string_lossy()).unwrap();
        assert_eq!(schema.main_table().unwrap().name, "apple");
    }

    #[test]
    fn test_missing_database_is_unreachable() {
        let err = discover_schema("/nonexistent/nowhere.db").unwrap_err();
        assert_eq!(err.code(), "DATA_SOURCE_UNREACHABLE");
    }

    #[test]
    fn test_cache_invalidated_on_modification() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_db(&dir);
        let mut discovery = SchemaDiscovery::new();

        let before = discovery.discover(&path).unwrap();
        assert_eq!(before.tables["Meters"].row_count, 3);

        // Touch the database and make sure the mtime moves.
        std::thread::sleep(std::time::Duration::from_millis(20));
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO Meters VALUES (4, 'PM5110', 'PM5000', 0.5)",
            [],
        )
        .unwrap();
        drop(conn);
        let now = std::time::SystemTime::now();
        let _ = std::fs::File::open(&path).and_then(|f| f.set_modified(now));

        let after = discovery.discover(&path).unwrap();
        assert_eq!(after.tables["Meters"].row_count, 4);
    }
}
