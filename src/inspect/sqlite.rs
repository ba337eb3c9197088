//! SQLite catalog source
//!
//! The embedded engine exposes no tabular catalog, only `sqlite_master`
//! and per-table pragmas, so this source walks the schema object by
//! object. Its regular walk cannot see foreign keys at all; those are
//! recovered through [`SqliteSource::foreign_key_fallback`], which reads
//! the `foreign_key_list` pragma directly.

use crate::inspect::{
    CatalogError, CatalogSource, ColumnObject, ForeignKeyObject, IndexObject, ReflectionStrategy,
    TableObject,
};
use crate::schema::{synthesize_key, KeyKind};
use log::debug;
use regex::Regex;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;
use std::sync::LazyLock;

static DECLARED_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([a-zA-Z][a-zA-Z0-9 ]*?)\s*(?:\(\s*([0-9]+)\s*(?:,\s*([0-9]+)\s*)?\))?\s*$")
        .expect("declared-type pattern is valid")
});

/// Object-walk catalog source backed by an embedded SQLite database.
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    /// Open a database file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Sqlite` when the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Open a fresh in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Sqlite` when the connection cannot be made.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn table_names(&self) -> Result<Vec<String>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn walk_columns(&self, table: &str) -> Result<(Vec<ColumnObject>, Vec<String>), CatalogError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>("name")?,
                    row.get::<_, String>("type")?,
                    row.get::<_, i64>("notnull")?,
                    row.get::<_, Option<String>>("dflt_value")?,
                    row.get::<_, i64>("pk")?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut columns = Vec::with_capacity(rows.len());
        let mut primary = Vec::new();
        for (name, declared, notnull, dflt_value, pk) in rows {
            let parsed = parse_declared_type(&declared);
            if pk > 0 {
                primary.push(name.clone());
            }
            columns.push(ColumnObject {
                auto_increment: pk > 0 && parsed.base == "integer",
                nullable: notnull == 0 && pk == 0,
                default: dflt_value.as_deref().and_then(literal_default),
                name,
                raw_type: Some(declared.to_lowercase()),
                type_name: parsed.base,
                length: parsed.length,
                precision: parsed.precision,
                scale: parsed.scale,
                unsigned: parsed.unsigned,
                comment: None,
            });
        }
        Ok((columns, primary))
    }

    fn walk_indexes(
        &self,
        table: &str,
        primary_columns: &[String],
    ) -> Result<Vec<IndexObject>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA index_list({})", quote_identifier(table)))?;
        let listed = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>("name")?,
                    row.get::<_, i64>("unique")?,
                    row.get::<_, String>("origin")?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut indexes = Vec::with_capacity(listed.len());
        let mut saw_primary = false;
        for (name, unique, origin) in listed {
            let primary = origin == "pk";
            saw_primary = saw_primary || primary;
            indexes.push(IndexObject {
                columns: self.index_columns(&name)?,
                name,
                unique: unique != 0,
                primary,
            });
        }

        // A rowid-backed integer primary key has no index entry of its
        // own; surface it as one anyway.
        if !saw_primary && !primary_columns.is_empty() {
            indexes.push(IndexObject {
                name: synthesize_key(table, primary_columns, KeyKind::Primary),
                columns: primary_columns.to_vec(),
                unique: true,
                primary: true,
            });
        }
        Ok(indexes)
    }

    fn index_columns(&self, index: &str) -> Result<Vec<String>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA index_info({})", quote_identifier(index)))?;
        let mut entries = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>("seqno")?,
                    row.get::<_, Option<String>>("name")?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|(seqno, _)| *seqno);
        Ok(entries
            .into_iter()
            .filter_map(|(_, name)| name)
            .collect())
    }
}

impl CatalogSource for SqliteSource {
    fn driver(&self) -> &str {
        "sqlite"
    }

    fn reflection(&self) -> Option<ReflectionStrategy> {
        Some(ReflectionStrategy::ObjectWalk)
    }

    fn objects(&mut self) -> Result<Vec<TableObject>, CatalogError> {
        let names = self.table_names()?;
        let mut objects = Vec::with_capacity(names.len());
        for name in names {
            let (columns, primary_columns) = self.walk_columns(&name)?;
            let indexes = self.walk_indexes(&name, &primary_columns)?;
            debug!(
                "walked table '{}' ({} columns, {} indexes)",
                name,
                columns.len(),
                indexes.len()
            );
            objects.push(TableObject {
                name,
                comment: None,
                columns,
                indexes,
                // The walk cannot see foreign keys; the pragma fallback
                // recovers them.
                foreign_keys: Vec::new(),
            });
        }
        Ok(objects)
    }

    fn foreign_key_fallback(&mut self, table: &str) -> Result<Vec<ForeignKeyObject>, CatalogError> {
        let mut stmt = self.conn.prepare(&format!(
            "PRAGMA foreign_key_list({})",
            quote_identifier(table)
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ForeignKeyRow {
                    id: row.get("id")?,
                    seq: row.get("seq")?,
                    target_table: row.get("table")?,
                    from: row.get("from")?,
                    to: row.get("to")?,
                    on_update: row.get("on_update")?,
                    on_delete: row.get("on_delete")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(group_foreign_key_rows(table, rows))
    }
}

/// One row of `PRAGMA foreign_key_list`.
#[derive(Debug, Clone)]
struct ForeignKeyRow {
    id: i64,
    seq: i64,
    target_table: String,
    from: String,
    to: Option<String>,
    on_update: String,
    on_delete: String,
}

/// Fold per-column pragma rows into whole constraints, grouped by the
/// pragma's constraint id. Constraints keep first-seen order; columns are
/// ordered by their sequence number.
fn group_foreign_key_rows(table: &str, mut rows: Vec<ForeignKeyRow>) -> Vec<ForeignKeyObject> {
    let order: Vec<i64> = {
        let mut seen = Vec::new();
        for row in &rows {
            if !seen.contains(&row.id) {
                seen.push(row.id);
            }
        }
        seen
    };
    rows.sort_by_key(|row| (row.id, row.seq));

    let mut keys = Vec::with_capacity(order.len());
    for id in order {
        let members: Vec<&ForeignKeyRow> = rows.iter().filter(|row| row.id == id).collect();
        let first = members[0];
        keys.push(ForeignKeyObject {
            name: Some(format!("fk_{}_{}", table, id)),
            columns: members.iter().map(|row| row.from.clone()).collect(),
            foreign_table: first.target_table.clone(),
            foreign_columns: members
                .iter()
                .filter_map(|row| row.to.clone())
                .collect(),
            on_update: rule_to_action(&first.on_update),
            on_delete: rule_to_action(&first.on_delete),
        });
    }
    keys
}

fn rule_to_action(rule: &str) -> Option<String> {
    let lowered = rule.to_lowercase();
    if lowered == "no action" {
        None
    } else {
        Some(lowered)
    }
}

/// Double-quote an identifier for interpolation into a pragma, which
/// cannot take bound parameters.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Default)]
struct DeclaredType {
    base: String,
    length: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
    unsigned: bool,
}

/// Split a declared column type like `varchar(191)` or
/// `decimal(8,2) unsigned` into its parts. A bare or unparseable
/// declaration keeps the whole text as the base type.
fn parse_declared_type(declared: &str) -> DeclaredType {
    let lowered = declared.to_lowercase();
    let (body, unsigned) = match lowered.strip_suffix(" unsigned") {
        Some(stripped) => (stripped, true),
        None => (lowered.as_str(), false),
    };

    let Some(captures) = DECLARED_TYPE.captures(body) else {
        return DeclaredType {
            base: body.trim().to_string(),
            unsigned,
            ..DeclaredType::default()
        };
    };

    let base = captures[1].trim().to_string();
    let first: Option<u32> = captures.get(2).and_then(|m| m.as_str().parse().ok());
    let second: Option<u32> = captures.get(3).and_then(|m| m.as_str().parse().ok());

    match (first, second) {
        (Some(precision), Some(scale)) => DeclaredType {
            base,
            precision: Some(precision),
            scale: Some(scale),
            unsigned,
            ..DeclaredType::default()
        },
        (Some(length), None) => DeclaredType {
            base,
            length: Some(length),
            unsigned,
            ..DeclaredType::default()
        },
        _ => DeclaredType {
            base,
            unsigned,
            ..DeclaredType::default()
        },
    }
}

/// Interpret a pragma default literal: quoted strings lose their quotes,
/// the NULL keyword means no default, anything else passes through.
fn literal_default(literal: &str) -> Option<Value> {
    if literal.eq_ignore_ascii_case("null") {
        return None;
    }
    let unquoted = literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .map(|inner| inner.replace("''", "'"));
    Some(Value::String(unquoted.unwrap_or_else(|| literal.to_string())))
}
