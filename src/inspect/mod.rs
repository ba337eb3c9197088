//! Catalog inspection
//!
//! Reads a live database's own metadata and normalizes it into the same
//! canonical model the replay path produces, so the formatter and
//! serializer never know which path built it.
//!
//! Two strategies, selected by probing the source's capabilities:
//! tabular catalog reflection (the source yields generic column/index/
//! foreign-key rows) or a per-object metadata walk (the source only
//! exposes an object model). A source advertising neither is rejected
//! with `ExportError::MissingCapability`.

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresSource;
pub use sqlite::SqliteSource;

use crate::error::ExportError;
use crate::schema::{stringify_default, synthesize_key, Column, ForeignKey, Index, KeyKind, Table};
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;
use std::fmt;

/// Driver-level catalog error
#[derive(Debug)]
pub enum CatalogError {
    /// PostgreSQL error from may_postgres
    Postgres(may_postgres::Error),
    /// SQLite error from rusqlite
    Sqlite(rusqlite::Error),
    /// The source does not implement the requested reflection surface
    Unsupported(String),
    /// A catalog row could not be interpreted
    Malformed(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Postgres(e) => write!(f, "PostgreSQL error: {}", e),
            CatalogError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            CatalogError::Unsupported(s) => write!(f, "Unsupported catalog operation: {}", s),
            CatalogError::Malformed(s) => write!(f, "Malformed catalog row: {}", s),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<may_postgres::Error> for CatalogError {
    fn from(err: may_postgres::Error) -> Self {
        CatalogError::Postgres(err)
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Sqlite(err)
    }
}

/// How a catalog source exposes its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionStrategy {
    /// Column/index/foreign-key descriptions arrive as generic rows
    Tabular,
    /// Metadata is walked object by object
    ObjectWalk,
}

/// One table as discovered by the per-object walk.
#[derive(Debug, Clone, Default)]
pub struct TableObject {
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<ColumnObject>,
    pub indexes: Vec<IndexObject>,
    pub foreign_keys: Vec<ForeignKeyObject>,
}

/// One column as discovered in the catalog, before canonicalization.
#[derive(Debug, Clone)]
pub struct ColumnObject {
    pub name: String,
    /// Base type name reported by the catalog
    pub type_name: String,
    /// Full declared type text when the catalog preserves it
    pub raw_type: Option<String>,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub default: Option<Value>,
    pub unsigned: bool,
    pub auto_increment: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IndexObject {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub primary: bool,
}

#[derive(Debug, Clone)]
pub struct ForeignKeyObject {
    /// Constraint name; synthesized during canonicalization when absent
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub foreign_table: String,
    pub foreign_columns: Vec<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

/// A live database's metadata surface.
///
/// Sources advertise one reflection strategy and implement the matching
/// methods; the unused surface keeps its default (rejecting) bodies.
pub trait CatalogSource {
    /// Driver identifier, e.g. `postgres` or `sqlite`.
    fn driver(&self) -> &str;

    /// Which reflection strategy the source supports, if any.
    fn reflection(&self) -> Option<ReflectionStrategy>;

    /// Tabular surface: one row per table, at least a `name` field.
    fn table_rows(&mut self) -> Result<Vec<Value>, CatalogError> {
        Err(CatalogError::Unsupported(format!(
            "driver '{}' has no tabular table listing",
            self.driver()
        )))
    }

    /// Tabular surface: column rows for one table.
    fn column_rows(&mut self, table: &str) -> Result<Vec<Value>, CatalogError> {
        Err(CatalogError::Unsupported(format!(
            "driver '{}' has no tabular column listing for '{}'",
            self.driver(),
            table
        )))
    }

    /// Tabular surface: index rows for one table.
    fn index_rows(&mut self, table: &str) -> Result<Vec<Value>, CatalogError> {
        Err(CatalogError::Unsupported(format!(
            "driver '{}' has no tabular index listing for '{}'",
            self.driver(),
            table
        )))
    }

    /// Tabular surface: foreign-key rows for one table.
    fn foreign_key_rows(&mut self, table: &str) -> Result<Vec<Value>, CatalogError> {
        Err(CatalogError::Unsupported(format!(
            "driver '{}' has no tabular foreign-key listing for '{}'",
            self.driver(),
            table
        )))
    }

    /// Object-walk surface: every table as a walked object.
    fn objects(&mut self) -> Result<Vec<TableObject>, CatalogError> {
        Err(CatalogError::Unsupported(format!(
            "driver '{}' has no object-walk surface",
            self.driver()
        )))
    }

    /// Driver-specific fallback when the regular surface reports no
    /// foreign keys for a table. The default reports none either.
    fn foreign_key_fallback(&mut self, _table: &str) -> Result<Vec<ForeignKeyObject>, CatalogError> {
        Ok(Vec::new())
    }
}

/// Normalizes a catalog source into the canonical model.
///
/// Table names carrying the configured prefix are stripped of it to form
/// the canonical map key; the prefixed physical name stays on the table
/// as its display label.
pub struct SchemaInspector {
    source: Box<dyn CatalogSource>,
    prefix: String,
    driver: String,
}

impl SchemaInspector {
    pub fn new(source: Box<dyn CatalogSource>) -> Self {
        Self::with_prefix(source, "")
    }

    pub fn with_prefix(source: Box<dyn CatalogSource>, prefix: &str) -> Self {
        // Resolved once; sources may derive it from the live connection.
        let driver = source.driver().to_string();
        Self {
            source,
            prefix: prefix.to_string(),
            driver,
        }
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Read the whole catalog into the canonical model.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::MissingCapability` when the source supports
    /// neither reflection strategy, or `ExportError::Catalog` on driver
    /// failures.
    pub fn tables(&mut self) -> Result<IndexMap<String, Table>, ExportError> {
        let strategy = self.source.reflection().ok_or_else(|| {
            ExportError::MissingCapability {
                driver: self.driver.clone(),
                capability: "schema reflection".to_string(),
            }
        })?;

        let objects = match strategy {
            ReflectionStrategy::Tabular => self.collect_tabular()?,
            ReflectionStrategy::ObjectWalk => self.source.objects()?,
        };

        let mut tables = IndexMap::new();
        for mut object in objects {
            if object.foreign_keys.is_empty() && self.driver == "sqlite" {
                // Known gap: the embedded engine's regular surface reports
                // no foreign keys; its own pragma still does.
                object.foreign_keys = self.source.foreign_key_fallback(&object.name)?;
            }
            let (key, table) = self.canonicalize(object);
            debug!(
                "inspected table '{}' ({} columns, {} indexes, {} foreign keys)",
                table.name,
                table.columns.len(),
                table.indexes.len(),
                table.foreign_keys.len()
            );
            tables.insert(key, table);
        }
        Ok(tables)
    }

    fn collect_tabular(&mut self) -> Result<Vec<TableObject>, ExportError> {
        let rows = self.source.table_rows()?;
        let mut objects = Vec::with_capacity(rows.len());

        for row in rows {
            let Some(name) = first_string(&row, &["name", "table_name"]) else {
                continue;
            };
            let columns = self
                .source
                .column_rows(&name)?
                .iter()
                .filter_map(normalize_column)
                .collect();
            let indexes = self
                .source
                .index_rows(&name)?
                .iter()
                .filter_map(normalize_index)
                .collect();
            let foreign_keys = self
                .source
                .foreign_key_rows(&name)?
                .iter()
                .filter_map(normalize_foreign_key)
                .collect();

            objects.push(TableObject {
                comment: first_string(&row, &["comment"]),
                name,
                columns,
                indexes,
                foreign_keys,
            });
        }
        Ok(objects)
    }

    /// Map a walked table into the canonical shape, keyed by its
    /// prefix-stripped name.
    fn canonicalize(&self, object: TableObject) -> (String, Table) {
        let key = self.strip_prefix(&object.name);
        let mut table = Table::new(&object.name);
        table.comment = object.comment;

        for column in object.columns {
            table.put_column(Column {
                raw_type: column
                    .raw_type
                    .unwrap_or_else(|| column.type_name.clone()),
                normalized_type: column.type_name,
                name: column.name,
                length: column.length,
                precision: column.precision,
                scale: column.scale,
                nullable: column.nullable,
                default: column.default.as_ref().and_then(stringify_default),
                unsigned: column.unsigned,
                auto_increment: column.auto_increment,
                comment: column.comment,
            });
        }

        for index in object.indexes {
            table.put_index(Index {
                name: index.name,
                table: object.name.clone(),
                columns: index.columns,
                unique: index.unique || index.primary,
                primary: index.primary,
            });
        }

        for fk in object.foreign_keys {
            let name = fk
                .name
                .unwrap_or_else(|| synthesize_key(&key, &fk.columns, KeyKind::Foreign));
            table.put_foreign_key(ForeignKey {
                name,
                columns: fk.columns,
                // Relationship lines must point at table labels, which keep
                // their physical prefix.
                target_table: fk.foreign_table,
                target_columns: fk.foreign_columns,
                on_update: fk.on_update,
                on_delete: fk.on_delete,
            });
        }

        (key, table)
    }

    fn strip_prefix(&self, table: &str) -> String {
        if !self.prefix.is_empty() {
            if let Some(stripped) = table.strip_prefix(&self.prefix) {
                return stripped.to_string();
            }
        }
        table.to_string()
    }
}

/// Normalize one tabular column row. Accepts the alternate field
/// spellings different toolkits use for the same concept.
pub fn normalize_column(row: &Value) -> Option<ColumnObject> {
    let name = first_string(row, &["name", "column_name"])?;
    let type_name = first_string(row, &["type_name", "data_type", "type"])
        .unwrap_or_else(|| "string".to_string());

    Some(ColumnObject {
        name,
        raw_type: first_string(row, &["type"]),
        type_name,
        length: first_u32(row, &["length", "character_maximum_length"]),
        precision: first_u32(row, &["precision", "numeric_precision"]),
        scale: first_u32(row, &["scale", "numeric_scale"]),
        nullable: bool_field(row, &["nullable", "is_nullable"]),
        default: non_null_field(row, &["default", "column_default"]),
        unsigned: bool_field(row, &["unsigned"]),
        auto_increment: bool_field(row, &["auto_increment", "autoincrement"]),
        comment: first_string(row, &["comment"]),
    })
}

/// Normalize one tabular index row. Column lists arrive either as arrays
/// or as comma-joined strings.
pub fn normalize_index(row: &Value) -> Option<IndexObject> {
    let name = first_string(row, &["name", "index_name"])?;
    Some(IndexObject {
        name,
        columns: column_list(row, &["columns", "column"]),
        unique: bool_field(row, &["unique"]),
        primary: bool_field(row, &["primary"]),
    })
}

/// Normalize one tabular foreign-key row, tolerating the various
/// referenced-table and referenced-column spellings.
pub fn normalize_foreign_key(row: &Value) -> Option<ForeignKeyObject> {
    let foreign_table = first_string(
        row,
        &[
            "foreign_table",
            "on",
            "referenced_table",
            "referenced_table_name",
        ],
    )?;

    Some(ForeignKeyObject {
        name: first_string(row, &["name", "constraint_name"]),
        columns: column_list(row, &["columns", "column"]),
        foreign_table,
        foreign_columns: column_list(
            row,
            &["foreign_columns", "references", "referenced_columns"],
        ),
        on_update: first_string(row, &["on_update", "onUpdate"]),
        on_delete: first_string(row, &["on_delete", "onDelete"]),
    })
}

fn field<'a>(row: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| row.get(key))
        .find(|value| !value.is_null())
}

fn non_null_field(row: &Value, keys: &[&str]) -> Option<Value> {
    field(row, keys).cloned()
}

fn first_string(row: &Value, keys: &[&str]) -> Option<String> {
    match field(row, keys)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn first_u32(row: &Value, keys: &[&str]) -> Option<u32> {
    match field(row, keys)? {
        Value::Number(n) => n.as_u64().map(|v| v as u32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn bool_field(row: &Value, keys: &[&str]) -> bool {
    match field(row, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "yes" | "true" | "1"),
        _ => false,
    }
}

/// Column lists come back as arrays of strings or comma-joined strings;
/// either way the result is a trimmed, empty-free vector.
fn column_list(row: &Value, keys: &[&str]) -> Vec<String> {
    match field(row, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
