//! Schema formatter
//!
//! Derives render-ready documents from the canonical model without
//! mutating it. The formatter decides which columns carry key tags, what
//! type text to print, and how indexes and relationships are labelled;
//! the serializer then turns these documents into DBML.

use crate::schema::{format_type_definition, Table};
use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static LENGTH_IN_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".+\(([0-9]+)\)").expect("length pattern is valid"));

/// Project header document.
#[derive(Debug, Clone)]
pub struct ProjectDoc {
    pub name: String,
    pub driver: String,
    pub note: Option<String>,
}

/// One table, ready to render.
#[derive(Debug, Clone)]
pub struct TableDoc {
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<ColumnDoc>,
    pub indexes: Vec<IndexDoc>,
    pub foreign_keys: Vec<ForeignKeyDoc>,
}

/// One column line, ready to render.
#[derive(Debug, Clone)]
pub struct ColumnDoc {
    pub name: String,
    pub type_definition: String,
    /// Key tags in emission order (`pk`, `unique`)
    pub tags: Vec<String>,
    pub note: Option<String>,
    pub nullable: bool,
    pub default: Option<String>,
    /// Length, recovered from the attribute or the type text
    pub length: Option<u32>,
}

/// Precedence-ordered index kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTag {
    Primary,
    Unique,
    Plain,
}

#[derive(Debug, Clone)]
pub struct IndexDoc {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub tag: IndexTag,
}

#[derive(Debug, Clone)]
pub struct ForeignKeyDoc {
    pub name: String,
    pub from_table: String,
    pub columns: Vec<String>,
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

impl TableDoc {
    /// Plain console listing of this table's columns, one block per
    /// column.
    pub fn column_listing(&self) -> String {
        self.columns
            .iter()
            .map(|column| {
                format!(
                    "name : {}\ntype : {}\n",
                    column.name, column.type_definition
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plain console listing of this table's indexes.
    pub fn index_listing(&self) -> String {
        self.indexes
            .iter()
            .map(|index| {
                format!(
                    "name : {}\ncolumns : {}\nunique : {}\nprimary : {}\n",
                    index.name,
                    index.columns.join(" | "),
                    yes_no(index.tag != IndexTag::Plain),
                    yes_no(index.tag == IndexTag::Primary),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plain console listing of this table's outgoing relationships.
    pub fn relation_listing(&self) -> String {
        self.foreign_keys
            .iter()
            .map(|fk| {
                format!(
                    "[{}][{}] -> [{}] of [{}]",
                    self.name,
                    fk.columns.join(" | "),
                    fk.target_columns.join(" | "),
                    fk.target_table,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Turns canonical tables into render-ready documents.
///
/// Optional type overrides replace the normalized base type of matching
/// columns before the printable definition is built; the length,
/// precision, and unsigned suffixes still apply.
#[derive(Debug, Default)]
pub struct SchemaFormatter {
    type_overrides: HashMap<String, String>,
}

impl SchemaFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type_overrides(type_overrides: HashMap<String, String>) -> Self {
        if !type_overrides.is_empty() {
            debug!("{} custom type override(s) active", type_overrides.len());
        }
        Self { type_overrides }
    }

    /// Format every table, in model order.
    pub fn document(&self, tables: &IndexMap<String, Table>) -> Vec<TableDoc> {
        tables.values().map(|table| self.table_doc(table)).collect()
    }

    fn table_doc(&self, table: &Table) -> TableDoc {
        let primary_columns = primary_columns(table);
        let unique_columns = single_column_unique_members(table);

        let columns = table
            .columns
            .values()
            .map(|column| {
                let mut tags = Vec::new();
                if primary_columns.contains(&column.name) {
                    tags.push("pk".to_string());
                }
                if unique_columns.contains(&column.name) {
                    tags.push("unique".to_string());
                }

                let base = self
                    .type_overrides
                    .get(&column.normalized_type)
                    .cloned()
                    .unwrap_or_else(|| column.normalized_type.clone());
                let type_definition = format_type_definition(
                    &base,
                    column.length,
                    column.precision,
                    column.scale,
                    column.unsigned,
                );

                ColumnDoc {
                    name: column.name.clone(),
                    length: column.length.or_else(|| recover_length(&type_definition)),
                    type_definition,
                    tags,
                    note: column.comment.clone(),
                    nullable: column.nullable,
                    default: column.default.clone(),
                }
            })
            .collect();

        let indexes = table
            .indexes
            .values()
            .map(|index| IndexDoc {
                name: index.name.clone(),
                table: index.table.clone(),
                columns: index.columns.clone(),
                tag: if index.primary {
                    IndexTag::Primary
                } else if index.unique {
                    IndexTag::Unique
                } else {
                    IndexTag::Plain
                },
            })
            .collect();

        let foreign_keys = table
            .foreign_keys
            .values()
            .map(|fk| ForeignKeyDoc {
                name: fk.name.clone(),
                from_table: table.name.clone(),
                columns: fk.columns.clone(),
                target_table: fk.target_table.clone(),
                target_columns: fk.target_columns.clone(),
                on_update: fk.on_update.clone(),
                on_delete: fk.on_delete.clone(),
            })
            .collect();

        TableDoc {
            name: table.name.clone(),
            comment: table.comment.clone(),
            columns,
            indexes,
            foreign_keys,
        }
    }
}

/// Columns belonging to any primary-flagged index.
fn primary_columns(table: &Table) -> Vec<String> {
    let mut columns = Vec::new();
    for index in table.indexes.values() {
        if index.primary {
            for col in &index.columns {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }
    }
    columns
}

/// Columns covered by a single-column unique index.
fn single_column_unique_members(table: &Table) -> Vec<String> {
    let mut columns = Vec::new();
    for index in table.indexes.values() {
        if index.unique && index.columns.len() == 1 && !columns.contains(&index.columns[0]) {
            columns.push(index.columns[0].clone());
        }
    }
    columns
}

/// Recover a length suffix out of a type definition like `varchar(191)`.
fn recover_length(type_definition: &str) -> Option<u32> {
    LENGTH_IN_TYPE
        .captures(type_definition)
        .and_then(|captures| captures[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::SchemaRecorder;

    fn sample_tables() -> IndexMap<String, Table> {
        let mut schema = SchemaRecorder::new();
        schema.create("users", |table| {
            table.id();
            table.string("email").length(191);
            table.string("name").nullable();
            table.primary(&["id"]);
            table.unique(&["email"]);
        });
        schema.create("posts", |table| {
            table.id();
            table.foreign_id("user_id");
            table.string("title").comment("display title");
            table.index(&["user_id"]);
            table.foreign(&["user_id"]).references(&["id"]).on("users");
        });
        schema.into_tables()
    }

    #[test]
    fn test_primary_and_unique_tags() {
        let docs = SchemaFormatter::new().document(&sample_tables());
        let users = docs.iter().find(|d| d.name == "users").unwrap();

        let id = users.columns.iter().find(|c| c.name == "id").unwrap();
        assert!(id.tags.contains(&"pk".to_string()));

        let email = users.columns.iter().find(|c| c.name == "email").unwrap();
        assert_eq!(email.tags, vec!["unique".to_string()]);

        let name = users.columns.iter().find(|c| c.name == "name").unwrap();
        assert!(name.tags.is_empty());
        assert!(name.nullable);
    }

    #[test]
    fn test_length_recovered_from_type_text() {
        let docs = SchemaFormatter::new().document(&sample_tables());
        let users = docs.iter().find(|d| d.name == "users").unwrap();
        let email = users.columns.iter().find(|c| c.name == "email").unwrap();
        assert_eq!(email.type_definition, "string(191)");
        assert_eq!(email.length, Some(191));

        assert_eq!(recover_length("varchar(120)"), Some(120));
        assert_eq!(recover_length("text"), None);
    }

    #[test]
    fn test_index_tag_precedence() {
        let docs = SchemaFormatter::new().document(&sample_tables());
        let users = docs.iter().find(|d| d.name == "users").unwrap();

        let primary = users
            .indexes
            .iter()
            .find(|i| i.name == "users_id_primary")
            .unwrap();
        assert_eq!(primary.tag, IndexTag::Primary);

        let unique = users
            .indexes
            .iter()
            .find(|i| i.name == "users_email_unique")
            .unwrap();
        assert_eq!(unique.tag, IndexTag::Unique);

        let posts = docs.iter().find(|d| d.name == "posts").unwrap();
        let plain = posts
            .indexes
            .iter()
            .find(|i| i.name == "posts_user_id_index")
            .unwrap();
        assert_eq!(plain.tag, IndexTag::Plain);
    }

    #[test]
    fn test_type_overrides_replace_base_and_keep_suffixes() {
        let mut overrides = HashMap::new();
        overrides.insert("string".to_string(), "varchar".to_string());
        let docs = SchemaFormatter::with_type_overrides(overrides).document(&sample_tables());

        let users = docs.iter().find(|d| d.name == "users").unwrap();
        let email = users.columns.iter().find(|c| c.name == "email").unwrap();
        assert_eq!(email.type_definition, "varchar(191)");
    }

    #[test]
    fn test_console_listings() {
        let docs = SchemaFormatter::new().document(&sample_tables());
        let posts = docs.iter().find(|d| d.name == "posts").unwrap();

        assert!(posts.column_listing().contains("name : title"));
        let indexes = posts.index_listing();
        assert!(indexes.contains("name : posts_user_id_index"));
        assert!(indexes.contains("unique : no"));
        assert_eq!(
            posts.relation_listing(),
            "[posts][user_id] -> [id] of [users]"
        );
    }
}
