//! Replay path: rebuild a schema from declarative change-sets
//!
//! Change-sets run against a [`SchemaRecorder`] instead of a database.
//! Structural verbs (create, alter, drop, rename) are captured into the
//! canonical model by the [`SchemaCollector`]; data verbs hit an inert
//! null-object surface and return neutral values.
//!
//! ```
//! use schemadoc::replay::SchemaRecorder;
//!
//! let mut schema = SchemaRecorder::new();
//! schema.create("posts", |table| {
//!     table.id();
//!     table.foreign_id("user_id");
//!     table.string("title").length(200);
//!     table.foreign(&["user_id"]).references(&["id"]).on("users");
//! });
//!
//! let tables = schema.into_tables();
//! assert!(tables.contains_key("posts"));
//! ```

pub mod blueprint;
pub mod changeset;
pub mod collector;
pub mod recorder;

pub use blueprint::{Blueprint, ColumnKind, ColumnSpec, ForeignSpec, IndexSpec};
pub use changeset::{
    clear_registry, register_change, registered_versions, replay_registered, unregister_change,
    SchemaChange,
};
pub use collector::SchemaCollector;
pub use recorder::{InertStatements, SchemaRecorder, StatementSurface};
