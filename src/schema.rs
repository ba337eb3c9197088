//! Canonical schema model
//!
//! Provider-neutral description of a relational schema. Both the replay
//! recorder and the catalog inspector produce this model, and the DBML
//! formatter consumes it without knowing which path built it.

use indexmap::IndexMap;
use serde_json::Value;

/// Kind of a structural key, used when synthesizing constraint names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Primary,
    Unique,
    Index,
    Foreign,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Primary => "primary",
            KeyKind::Unique => "unique",
            KeyKind::Index => "index",
            KeyKind::Foreign => "foreign",
        }
    }
}

/// Synthesize a constraint name from table, columns, and kind.
///
/// Produces `lowercase(table_col1_col2..._kind)`, the same shape the
/// database itself would pick for an unnamed constraint. Declarations
/// that resolve to the same synthesized name replace each other, the
/// latest one wins.
pub fn synthesize_key(table: &str, columns: &[String], kind: KeyKind) -> String {
    let mut parts = Vec::with_capacity(columns.len() + 2);
    parts.push(table.to_string());
    parts.extend(columns.iter().cloned());
    parts.push(kind.as_str().to_string());
    parts.join("_").to_lowercase()
}

/// Render a raw default value as the string form stored on a column.
///
/// Booleans become `"1"` / `"0"`, arrays and objects render as compact
/// JSON, scalars via their display form. `Null` yields `None`.
pub fn stringify_default(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some("0".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// A single column of a table
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Type exactly as declared (replay verb or catalog type name)
    pub raw_type: String,
    /// Provider-neutral type after normalization
    pub normalized_type: String,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    /// Default value rendered as a string, if any
    pub default: Option<String>,
    pub unsigned: bool,
    pub auto_increment: bool,
    pub comment: Option<String>,
}

impl Column {
    /// Build the printable type definition for this column.
    pub fn type_definition(&self) -> String {
        format_type_definition(
            &self.normalized_type,
            self.length,
            self.precision,
            self.scale,
            self.unsigned,
        )
    }
}

/// Build a printable type definition from its parts.
///
/// Appends `(precision,scale)` when both are present, else `(length)`
/// when present, then a trailing ` unsigned` unless the type text
/// already carries it.
pub fn format_type_definition(
    base: &str,
    length: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
    unsigned: bool,
) -> String {
    let mut def = base.to_string();
    if let (Some(precision), Some(scale)) = (precision, scale) {
        def.push_str(&format!("({},{})", precision, scale));
    } else if let Some(length) = length {
        def.push_str(&format!("({})", length));
    }
    if unsigned && !def.contains("unsigned") {
        def.push_str(" unsigned");
    }
    def
}

/// A secondary or primary index
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: String,
    /// Owning table, kept in sync when the table is renamed
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub primary: bool,
}

/// A foreign-key constraint
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

/// A table: ordered columns plus its indexes and foreign keys
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub comment: Option<String>,
    pub columns: IndexMap<String, Column>,
    pub indexes: IndexMap<String, Index>,
    pub foreign_keys: IndexMap<String, ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: None,
            columns: IndexMap::new(),
            indexes: IndexMap::new(),
            foreign_keys: IndexMap::new(),
        }
    }

    /// Insert a column, replacing any earlier declaration with the same name.
    pub fn put_column(&mut self, column: Column) {
        self.columns.insert(column.name.clone(), column);
    }

    /// Insert an index under its (explicit or synthesized) name, replacing
    /// any earlier declaration stored under the same name.
    pub fn put_index(&mut self, index: Index) {
        self.indexes.insert(index.name.clone(), index);
    }

    /// Insert a foreign key under its name, replacing any earlier one.
    pub fn put_foreign_key(&mut self, fk: ForeignKey) {
        self.foreign_keys.insert(fk.name.clone(), fk);
    }

    /// Remove a column and cascade: every index and foreign key that
    /// references it is deleted as well.
    pub fn remove_column(&mut self, name: &str) {
        self.columns.shift_remove(name);
        self.indexes
            .retain(|_, index| !index.columns.iter().any(|c| c == name));
        self.foreign_keys
            .retain(|_, fk| !fk.columns.iter().any(|c| c == name));
    }

    /// Rename a column and rewrite every reference to it in index column
    /// lists and foreign-key local column lists. The column keeps its
    /// position in the ordered map.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        let Some(position) = self.columns.get_index_of(from) else {
            return false;
        };
        let Some(mut column) = self.columns.shift_remove(from) else {
            return false;
        };
        column.name = to.to_string();
        let (inserted_at, _) = self.columns.insert_full(to.to_string(), column);
        self.columns.move_index(inserted_at, position.min(self.columns.len() - 1));

        for index in self.indexes.values_mut() {
            for col in index.columns.iter_mut() {
                if col == from {
                    *col = to.to_string();
                }
            }
        }
        for fk in self.foreign_keys.values_mut() {
            for col in fk.columns.iter_mut() {
                if col == from {
                    *col = to.to_string();
                }
            }
        }
        true
    }

    /// Drop an index by explicit name, or failing that by exact column-list
    /// match among indexes of the requested kind. Returns whether an index
    /// was removed.
    pub fn remove_index(&mut self, name_or_columns: &NameOrColumns, kind: KeyKind) -> bool {
        match name_or_columns {
            NameOrColumns::Name(name) => self.indexes.shift_remove(name.as_str()).is_some(),
            NameOrColumns::Columns(columns) => {
                let key = self.indexes.iter().find_map(|(key, index)| {
                    let kind_matches = match kind {
                        KeyKind::Primary => index.primary,
                        KeyKind::Unique => index.unique && !index.primary,
                        _ => !index.unique && !index.primary,
                    };
                    if kind_matches && index.columns == *columns {
                        Some(key.clone())
                    } else {
                        None
                    }
                });
                match key {
                    Some(key) => self.indexes.shift_remove(&key).is_some(),
                    None => false,
                }
            }
        }
    }

    /// Drop a foreign key by explicit name, else by exact local column
    /// list. Returns whether a key was removed.
    pub fn remove_foreign_key(&mut self, name_or_columns: &NameOrColumns) -> bool {
        match name_or_columns {
            NameOrColumns::Name(name) => self.foreign_keys.shift_remove(name.as_str()).is_some(),
            NameOrColumns::Columns(columns) => {
                let key = self.foreign_keys.iter().find_map(|(key, fk)| {
                    if fk.columns == *columns {
                        Some(key.clone())
                    } else {
                        None
                    }
                });
                match key {
                    Some(key) => self.foreign_keys.shift_remove(&key).is_some(),
                    None => false,
                }
            }
        }
    }

    /// The primary index, if one is declared.
    pub fn primary_index(&self) -> Option<&Index> {
        self.indexes.values().find(|index| index.primary)
    }
}

/// Target of a drop command: an explicit constraint name or the exact
/// column list the constraint was declared over.
#[derive(Debug, Clone, PartialEq)]
pub enum NameOrColumns {
    Name(String),
    Columns(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str) -> Column {
        Column {
            name: name.to_string(),
            raw_type: "string".to_string(),
            normalized_type: "string".to_string(),
            length: None,
            precision: None,
            scale: None,
            nullable: false,
            default: None,
            unsigned: false,
            auto_increment: false,
            comment: None,
        }
    }

    #[test]
    fn test_synthesize_key_lowercases_and_joins() {
        let cols = vec!["Email".to_string(), "Tenant".to_string()];
        assert_eq!(
            synthesize_key("Users", &cols, KeyKind::Unique),
            "users_email_tenant_unique"
        );
    }

    #[test]
    fn test_stringify_default_bool_and_json() {
        assert_eq!(stringify_default(&json!(true)), Some("1".to_string()));
        assert_eq!(stringify_default(&json!(false)), Some("0".to_string()));
        assert_eq!(
            stringify_default(&json!(["a", "b"])),
            Some("[\"a\",\"b\"]".to_string())
        );
        assert_eq!(stringify_default(&json!(null)), None);
    }

    #[test]
    fn test_type_definition_precision_wins_over_length() {
        let mut col = column("price");
        col.normalized_type = "decimal".to_string();
        col.precision = Some(8);
        col.scale = Some(2);
        col.length = Some(255);
        assert_eq!(col.type_definition(), "decimal(8,2)");
    }

    #[test]
    fn test_type_definition_unsigned_suffix_not_duplicated() {
        let mut col = column("count");
        col.normalized_type = "int unsigned".to_string();
        col.unsigned = true;
        assert_eq!(col.type_definition(), "int unsigned");

        let mut col = column("count");
        col.normalized_type = "int".to_string();
        col.unsigned = true;
        assert_eq!(col.type_definition(), "int unsigned");
    }

    #[test]
    fn test_remove_column_cascades_to_indexes_and_fks() {
        let mut table = Table::new("posts");
        table.put_column(column("author_id"));
        table.put_column(column("title"));
        table.put_index(Index {
            name: "posts_author_id_index".to_string(),
            table: "posts".to_string(),
            columns: vec!["author_id".to_string()],
            unique: false,
            primary: false,
        });
        table.put_foreign_key(ForeignKey {
            name: "posts_author_id_foreign".to_string(),
            columns: vec!["author_id".to_string()],
            target_table: "users".to_string(),
            target_columns: vec!["id".to_string()],
            on_update: None,
            on_delete: None,
        });

        table.remove_column("author_id");

        assert!(!table.columns.contains_key("author_id"));
        assert!(table.indexes.is_empty());
        assert!(table.foreign_keys.is_empty());
        assert!(table.columns.contains_key("title"));
    }

    #[test]
    fn test_rename_column_rewrites_references() {
        let mut table = Table::new("posts");
        table.put_column(column("author_id"));
        table.put_index(Index {
            name: "posts_author_id_index".to_string(),
            table: "posts".to_string(),
            columns: vec!["author_id".to_string()],
            unique: false,
            primary: false,
        });
        table.put_foreign_key(ForeignKey {
            name: "posts_author_id_foreign".to_string(),
            columns: vec!["author_id".to_string()],
            target_table: "users".to_string(),
            target_columns: vec!["id".to_string()],
            on_update: None,
            on_delete: None,
        });

        assert!(table.rename_column("author_id", "writer_id"));

        assert!(table.columns.contains_key("writer_id"));
        let index = table.indexes.get("posts_author_id_index").unwrap();
        assert_eq!(index.columns, vec!["writer_id".to_string()]);
        let fk = table.foreign_keys.get("posts_author_id_foreign").unwrap();
        assert_eq!(fk.columns, vec!["writer_id".to_string()]);
    }

    #[test]
    fn test_rename_column_preserves_position() {
        let mut table = Table::new("posts");
        table.put_column(column("id"));
        table.put_column(column("title"));
        table.put_column(column("body"));

        table.rename_column("title", "headline");

        let names: Vec<&str> = table.columns.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["id", "headline", "body"]);
    }

    #[test]
    fn test_remove_index_by_columns_respects_kind() {
        let mut table = Table::new("users");
        table.put_index(Index {
            name: "users_email_unique".to_string(),
            table: "users".to_string(),
            columns: vec!["email".to_string()],
            unique: true,
            primary: false,
        });

        let target = NameOrColumns::Columns(vec!["email".to_string()]);
        assert!(!table.remove_index(&target, KeyKind::Index));
        assert!(table.remove_index(&target, KeyKind::Unique));
        assert!(table.indexes.is_empty());
    }

    #[test]
    fn test_put_index_dedupes_to_latest() {
        let mut table = Table::new("users");
        table.put_index(Index {
            name: "users_email_unique".to_string(),
            table: "users".to_string(),
            columns: vec!["email".to_string()],
            unique: true,
            primary: false,
        });
        table.put_index(Index {
            name: "users_email_unique".to_string(),
            table: "users".to_string(),
            columns: vec!["email".to_string(), "tenant".to_string()],
            unique: true,
            primary: false,
        });

        assert_eq!(table.indexes.len(), 1);
        let index = table.indexes.get("users_email_unique").unwrap();
        assert_eq!(index.columns.len(), 2);
    }
}
