//! Schema recorder
//!
//! The simulated backend that change-sets run against. Structural verbs
//! are captured into the collector; data verbs land on an inert statement
//! surface that returns neutral values, so seeding or backfill steps
//! inside a change-set replay without touching anything.
//!
//! The recorder is always passed explicitly down the call chain. There is
//! no global installation point to swap in and restore.

use crate::error::ExportError;
use crate::replay::blueprint::Blueprint;
use crate::replay::collector::SchemaCollector;
use crate::schema::Table;
use indexmap::IndexMap;
use log::trace;
use serde_json::Value;

/// Inert data-statement surface.
///
/// Every verb returns the neutral value for its shape: reads come back
/// empty, writes claim success without affecting anything.
pub trait StatementSurface {
    fn select(&self, query: &str, bindings: &[Value]) -> Vec<Value>;
    fn select_one(&self, query: &str, bindings: &[Value]) -> Option<Value>;
    fn insert(&self, query: &str, bindings: &[Value]) -> bool;
    fn update(&self, query: &str, bindings: &[Value]) -> u64;
    fn delete(&self, query: &str, bindings: &[Value]) -> u64;
    fn statement(&self, query: &str, bindings: &[Value]) -> bool;
    fn affecting_statement(&self, query: &str, bindings: &[Value]) -> u64;
    fn exists(&self, query: &str, bindings: &[Value]) -> bool;
    fn truncate(&self, table: &str);

    /// Run the closure directly; there is no transaction to wrap it in.
    fn transaction<T>(&self, run: impl FnOnce() -> T) -> T
    where
        Self: Sized,
    {
        run()
    }
}

/// Null-object implementation of [`StatementSurface`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InertStatements;

impl StatementSurface for InertStatements {
    fn select(&self, query: &str, _bindings: &[Value]) -> Vec<Value> {
        trace!("inert select: {}", query);
        Vec::new()
    }

    fn select_one(&self, query: &str, _bindings: &[Value]) -> Option<Value> {
        trace!("inert select_one: {}", query);
        None
    }

    fn insert(&self, query: &str, _bindings: &[Value]) -> bool {
        trace!("inert insert: {}", query);
        true
    }

    fn update(&self, query: &str, _bindings: &[Value]) -> u64 {
        trace!("inert update: {}", query);
        0
    }

    fn delete(&self, query: &str, _bindings: &[Value]) -> u64 {
        trace!("inert delete: {}", query);
        0
    }

    fn statement(&self, query: &str, _bindings: &[Value]) -> bool {
        trace!("inert statement: {}", query);
        true
    }

    fn affecting_statement(&self, query: &str, _bindings: &[Value]) -> u64 {
        trace!("inert affecting statement: {}", query);
        0
    }

    fn exists(&self, query: &str, _bindings: &[Value]) -> bool {
        trace!("inert exists: {}", query);
        false
    }

    fn truncate(&self, table: &str) {
        trace!("inert truncate: {}", table);
    }
}

/// Records the structural commands a change-set issues.
///
/// # Examples
///
/// ```
/// use schemadoc::replay::SchemaRecorder;
///
/// let mut schema = SchemaRecorder::new();
/// schema.create("users", |table| {
///     table.id();
///     table.string("email").length(191);
///     table.unique(&["email"]);
/// });
/// assert!(schema.has_table("users"));
/// ```
#[derive(Debug, Default)]
pub struct SchemaRecorder {
    collector: SchemaCollector,
    statements: InertStatements,
}

impl SchemaRecorder {
    pub fn new() -> Self {
        Self {
            collector: SchemaCollector::new(),
            statements: InertStatements,
        }
    }

    /// Declare a new table. Replaces any earlier declaration of the same
    /// table.
    pub fn create(&mut self, table: &str, build: impl FnOnce(&mut Blueprint)) {
        let mut blueprint = Blueprint::new(table);
        build(&mut blueprint);
        self.collector.create(&blueprint);
    }

    /// Alter an existing table (or declare it implicitly when absent).
    ///
    /// # Errors
    ///
    /// Returns `ExportError::CommandApply` when a recorded command cannot
    /// be applied, for example renaming an unknown column.
    pub fn table(
        &mut self,
        table: &str,
        build: impl FnOnce(&mut Blueprint),
    ) -> Result<(), ExportError> {
        let mut blueprint = Blueprint::new(table);
        build(&mut blueprint);
        self.collector.update(&blueprint)
    }

    /// Drop a table.
    pub fn drop(&mut self, table: &str) {
        self.collector.drop_table(table);
    }

    /// Drop a table, ignoring an absent entry.
    pub fn drop_if_exists(&mut self, table: &str) {
        self.collector.drop_table_if_exists(table);
    }

    /// Rename a table.
    pub fn rename(&mut self, from: &str, to: &str) {
        self.collector.rename_table(from, to);
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.collector.has_table(table)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.collector.has_column(table, column)
    }

    pub fn has_columns(&self, table: &str, columns: &[&str]) -> bool {
        self.collector.has_columns(table, columns)
    }

    /// Constraint toggles are meaningless during replay; both report
    /// success so change-sets that guard on them keep running.
    pub fn enable_foreign_key_constraints(&self) -> bool {
        true
    }

    pub fn disable_foreign_key_constraints(&self) -> bool {
        true
    }

    /// The inert data-statement surface.
    pub fn statements(&self) -> &InertStatements {
        &self.statements
    }

    /// The model collected so far.
    pub fn collected(&self) -> &IndexMap<String, Table> {
        self.collector.tables()
    }

    /// Consume the recorder and return the collected model.
    pub fn into_tables(self) -> IndexMap<String, Table> {
        self.collector.into_tables()
    }
}
