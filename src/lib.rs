//! # Schemadoc
//!
//! Schema-to-DBML export for relational databases.
//!
//! A canonical schema model is assembled either by replaying declarative
//! change-sets against a simulated backend ([`replay`]) or by inspecting
//! a live database catalog ([`inspect`]). The [`dbml`] layer formats the
//! model and serializes it to DBML text; [`export`] orchestrates the
//! whole run and writes the artifact file.
//!
//! ```
//! use schemadoc::export::{Exporter, ExportSource};
//! use schemadoc::replay::{register_change, unregister_change, SchemaChange, SchemaRecorder};
//! use schemadoc::ExportError;
//!
//! struct CreateUsers;
//!
//! impl SchemaChange for CreateUsers {
//!     fn name(&self) -> &str {
//!         "create_users"
//!     }
//!
//!     fn version(&self) -> i64 {
//!         20240101000000
//!     }
//!
//!     fn up(&self, schema: &mut SchemaRecorder) -> Result<(), ExportError> {
//!         schema.create("users", |table| {
//!             table.id();
//!             table.string("email").length(191);
//!             table.primary(&["id"]);
//!             table.unique(&["email"]);
//!         });
//!         Ok(())
//!     }
//! }
//!
//! # let dir = tempfile::tempdir().unwrap();
//! register_change(Box::new(CreateUsers))?;
//!
//! let exporter = Exporter::new("blog", "postgres", dir.path());
//! let outcome = exporter.run(ExportSource::Replay)?;
//! assert_eq!(outcome.tables, 1);
//! # unregister_change(20240101000000)?;
//! # Ok::<(), schemadoc::ExportError>(())
//! ```

pub mod config;
pub mod connection;
pub mod dbml;
pub mod error;
pub mod export;
pub mod inspect;
pub mod replay;
pub mod schema;

pub use error::ExportError;
pub use export::{ExportOutcome, ExportSource, Exporter};
