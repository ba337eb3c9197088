//! DBML serializer
//!
//! Pure function from formatted documents to output text. All literal
//! grammar goes through the [`DbmlSyntax`] primitives; the serializer
//! only sequences them. Every block it opens is closed on every path,
//! including empty tables and models with no tables at all.

use crate::dbml::formatter::{ProjectDoc, TableDoc};
use crate::dbml::syntax::DbmlSyntax;
use crate::error::ExportError;

/// Sequences rendering primitives over formatted documents.
#[derive(Debug, Default)]
pub struct DbmlSerializer<S: DbmlSyntax> {
    syntax: S,
}

impl<S: DbmlSyntax> DbmlSerializer<S> {
    pub fn new(syntax: S) -> Self {
        Self { syntax }
    }

    /// Render the whole document.
    ///
    /// Emission order: project header once; then per table, in model
    /// order: table open, column lines, optional note, indexes block
    /// when any index exists, table close, and that table's relationship
    /// lines.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Serialization` when a rendering primitive
    /// fails.
    pub fn serialize(
        &self,
        project: &ProjectDoc,
        tables: &[TableDoc],
    ) -> Result<String, ExportError> {
        let mut out = self.syntax.project(project)?;

        for table in tables {
            if table.name.is_empty() {
                continue;
            }

            out.push_str(&self.syntax.open_table(&table.name)?);
            for column in &table.columns {
                out.push_str(&self.syntax.column(column)?);
            }
            if let Some(comment) = &table.comment {
                out.push_str(&self.syntax.note(comment)?);
            }
            if !table.indexes.is_empty() {
                out.push_str(&self.syntax.open_indexes()?);
                for index in &table.indexes {
                    out.push_str(&self.syntax.index_entry(index)?);
                }
                out.push('\t');
                out.push_str(&self.syntax.close()?);
            }
            out.push_str(&self.syntax.close()?);

            for fk in &table.foreign_keys {
                out.push_str(&self.syntax.relationship(fk)?);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbml::formatter::{ColumnDoc, ForeignKeyDoc, IndexDoc, SchemaFormatter};
    use crate::dbml::syntax::StandardDbml;
    use crate::replay::SchemaRecorder;

    fn project() -> ProjectDoc {
        ProjectDoc {
            name: "blog".to_string(),
            driver: "postgres".to_string(),
            note: None,
        }
    }

    #[test]
    fn test_empty_model_emits_header_only() {
        let serializer = DbmlSerializer::new(StandardDbml);
        let text = serializer.serialize(&project(), &[]).unwrap();
        assert_eq!(text, "Project blog {\n\tdatabase_type: 'postgres'\n}\n");
        assert_eq!(
            text.matches('{').count(),
            text.matches('}').count(),
            "every opened block is closed"
        );
    }

    #[test]
    fn test_full_document_shape() {
        let mut schema = SchemaRecorder::new();
        schema.create("users", |table| {
            table.id();
            table.string("email").length(191);
            table.primary(&["id"]);
            table.unique(&["email"]);
        });
        schema.create("posts", |table| {
            table.id();
            table.foreign_id("user_id");
            table.foreign(&["user_id"]).references(&["id"]).on("users");
        });
        let docs = SchemaFormatter::new().document(&schema.into_tables());

        let serializer = DbmlSerializer::new(StandardDbml);
        let text = serializer.serialize(&project(), &docs).unwrap();

        assert!(text.starts_with("Project blog {"));
        assert!(text.contains("Table users {"));
        assert!(text.contains("\tid bigint unsigned [pk, unique, not null]\n"));
        assert!(text.contains("\temail string(191) [unique, not null]\n"));
        assert!(text.contains("\tindexes {\n\t\t(id) [pk]\n\t\t(email) [unique]\n\t}\n"));
        assert!(text.contains("Table posts {"));
        assert!(text.contains("Ref: posts.user_id > users.id\n"));
        assert_eq!(text.matches('{').count(), text.matches('}').count());

        let users_at = text.find("Table users").unwrap();
        let ref_at = text.find("Ref: posts").unwrap();
        assert!(ref_at > users_at, "relationships follow their table");
    }

    #[test]
    fn test_table_without_indexes_omits_the_block() {
        let mut schema = SchemaRecorder::new();
        schema.create("logs", |table| {
            table.text("line");
        });
        let docs = SchemaFormatter::new().document(&schema.into_tables());
        let text = DbmlSerializer::new(StandardDbml)
            .serialize(&project(), &docs)
            .unwrap();
        assert!(!text.contains("indexes"));
        assert_eq!(text.matches('{').count(), text.matches('}').count());
    }

    #[test]
    fn test_nameless_table_is_skipped() {
        let doc = TableDoc {
            name: String::new(),
            comment: None,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        };
        let text = DbmlSerializer::new(StandardDbml)
            .serialize(&project(), &[doc])
            .unwrap();
        assert!(!text.contains("Table"));
    }

    /// Syntax whose column primitive always fails.
    struct BrokenSyntax;

    impl DbmlSyntax for BrokenSyntax {
        fn project(&self, project: &ProjectDoc) -> Result<String, ExportError> {
            StandardDbml.project(project)
        }

        fn open_table(&self, name: &str) -> Result<String, ExportError> {
            StandardDbml.open_table(name)
        }

        fn column(&self, column: &ColumnDoc) -> Result<String, ExportError> {
            Err(ExportError::Serialization(format!(
                "cannot render column '{}'",
                column.name
            )))
        }

        fn note(&self, note: &str) -> Result<String, ExportError> {
            StandardDbml.note(note)
        }

        fn open_indexes(&self) -> Result<String, ExportError> {
            StandardDbml.open_indexes()
        }

        fn index_entry(&self, index: &IndexDoc) -> Result<String, ExportError> {
            StandardDbml.index_entry(index)
        }

        fn close(&self) -> Result<String, ExportError> {
            StandardDbml.close()
        }

        fn relationship(&self, fk: &ForeignKeyDoc) -> Result<String, ExportError> {
            StandardDbml.relationship(fk)
        }
    }

    #[test]
    fn test_primitive_failure_surfaces_as_serialization_error() {
        let doc = TableDoc {
            name: "users".to_string(),
            comment: None,
            columns: vec![ColumnDoc {
                name: "id".to_string(),
                type_definition: "bigint".to_string(),
                tags: vec!["pk".to_string()],
                note: None,
                nullable: false,
                default: None,
                length: None,
            }],
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        };
        let err = DbmlSerializer::new(BrokenSyntax)
            .serialize(&project(), &[doc])
            .unwrap_err();
        assert!(matches!(err, ExportError::Serialization(_)));
        assert!(err.to_string().contains("id"));
    }
}
