//! DBML rendering vocabulary
//!
//! The serializer emits text exclusively through these primitives, so the
//! literal grammar lives in one place. [`StandardDbml`] produces plain
//! DBML; tests substitute failing implementations to exercise the
//! degrade path.

use crate::dbml::formatter::{ColumnDoc, ForeignKeyDoc, IndexDoc, IndexTag, ProjectDoc};
use crate::error::ExportError;

/// Line and block rendering primitives for the target notation.
pub trait DbmlSyntax {
    /// Project header stanza, emitted exactly once.
    fn project(&self, project: &ProjectDoc) -> Result<String, ExportError>;

    /// Open a table block.
    fn open_table(&self, name: &str) -> Result<String, ExportError>;

    /// One column line inside a table block.
    fn column(&self, column: &ColumnDoc) -> Result<String, ExportError>;

    /// A table-level note line.
    fn note(&self, note: &str) -> Result<String, ExportError>;

    /// Open the indexes sub-block.
    fn open_indexes(&self) -> Result<String, ExportError>;

    /// One entry inside the indexes sub-block.
    fn index_entry(&self, index: &IndexDoc) -> Result<String, ExportError>;

    /// Close the innermost open block.
    fn close(&self) -> Result<String, ExportError>;

    /// One relationship line for a foreign key.
    fn relationship(&self, fk: &ForeignKeyDoc) -> Result<String, ExportError>;
}

/// Stock DBML grammar.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDbml;

impl DbmlSyntax for StandardDbml {
    fn project(&self, project: &ProjectDoc) -> Result<String, ExportError> {
        let mut out = format!(
            "Project {} {{\n\tdatabase_type: '{}'\n",
            project.name, project.driver
        );
        if let Some(note) = &project.note {
            out.push_str(&format!("\tNote: '{}'\n", escape(note)));
        }
        out.push_str("}\n");
        Ok(out)
    }

    fn open_table(&self, name: &str) -> Result<String, ExportError> {
        Ok(format!("\nTable {} {{\n", name))
    }

    fn column(&self, column: &ColumnDoc) -> Result<String, ExportError> {
        let mut attrs: Vec<String> = column.tags.clone();
        attrs.push(if column.nullable {
            "null".to_string()
        } else {
            "not null".to_string()
        });
        if let Some(default) = &column.default {
            attrs.push(format!("default: {}", render_default(default)));
        }
        if let Some(note) = &column.note {
            attrs.push(format!("note: '{}'", escape(note)));
        }
        Ok(format!(
            "\t{} {} [{}]\n",
            column.name,
            column.type_definition,
            attrs.join(", ")
        ))
    }

    fn note(&self, note: &str) -> Result<String, ExportError> {
        Ok(format!("\n\tNote: '{}'\n", escape(note)))
    }

    fn open_indexes(&self) -> Result<String, ExportError> {
        Ok("\n\tindexes {\n".to_string())
    }

    fn index_entry(&self, index: &IndexDoc) -> Result<String, ExportError> {
        let columns = index.columns.join(", ");
        Ok(match index.tag {
            IndexTag::Primary => format!("\t\t({}) [pk]\n", columns),
            IndexTag::Unique => format!("\t\t({}) [unique]\n", columns),
            IndexTag::Plain => format!("\t\t({})\n", columns),
        })
    }

    fn close(&self) -> Result<String, ExportError> {
        Ok("}\n".to_string())
    }

    fn relationship(&self, fk: &ForeignKeyDoc) -> Result<String, ExportError> {
        let mut out = format!(
            "Ref: {}.{} > {}.{}",
            fk.from_table,
            column_ref(&fk.columns),
            fk.target_table,
            column_ref(&fk.target_columns),
        );
        let mut settings = Vec::new();
        if let Some(action) = &fk.on_update {
            settings.push(format!("update: {}", action));
        }
        if let Some(action) = &fk.on_delete {
            settings.push(format!("delete: {}", action));
        }
        if !settings.is_empty() {
            out.push_str(&format!(" [{}]", settings.join(", ")));
        }
        out.push('\n');
        Ok(out)
    }
}

/// A single column renders bare; composite keys render parenthesized.
fn column_ref(columns: &[String]) -> String {
    if columns.len() == 1 {
        columns[0].clone()
    } else {
        format!("({})", columns.join(", "))
    }
}

/// Numbers and booleans render bare, everything else single-quoted.
fn render_default(default: &str) -> String {
    if default.parse::<f64>().is_ok() || default == "true" || default == "false" {
        default.to_string()
    } else {
        format!("'{}'", escape(default))
    }
}

fn escape(text: &str) -> String {
    text.replace('\'', "\\'")
}
