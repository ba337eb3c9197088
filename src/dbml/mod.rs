//! DBML rendering: formatter, rendering vocabulary, serializer
//!
//! The formatter derives presentation attributes (key tags, type text,
//! recovered lengths) from the canonical model; the serializer walks the
//! formatted documents and emits text through the [`DbmlSyntax`]
//! primitives. Neither cares whether the model came from change-set
//! replay or live catalog inspection.
//!
//! ```
//! use schemadoc::dbml::{DbmlSerializer, ProjectDoc, SchemaFormatter, StandardDbml};
//! use schemadoc::replay::SchemaRecorder;
//!
//! let mut schema = SchemaRecorder::new();
//! schema.create("users", |table| {
//!     table.id();
//!     table.primary(&["id"]);
//! });
//!
//! let docs = SchemaFormatter::new().document(&schema.into_tables());
//! let project = ProjectDoc {
//!     name: "blog".to_string(),
//!     driver: "postgres".to_string(),
//!     note: None,
//! };
//! let text = DbmlSerializer::new(StandardDbml).serialize(&project, &docs)?;
//! assert!(text.contains("Table users {"));
//! # Ok::<(), schemadoc::ExportError>(())
//! ```

pub mod formatter;
pub mod serializer;
pub mod syntax;

pub use formatter::{
    ColumnDoc, ForeignKeyDoc, IndexDoc, IndexTag, ProjectDoc, SchemaFormatter, TableDoc,
};
pub use serializer::DbmlSerializer;
pub use syntax::{DbmlSyntax, StandardDbml};
