//! Schema collector
//!
//! Folds recorded blueprints into the canonical model. Tables are held as
//! uniquely owned records; every update takes the record out of the map,
//! rewrites it, and puts it back, so no mutation ever happens through an
//! aliased handle.

use crate::error::ExportError;
use crate::replay::blueprint::{AlterCommand, Blueprint};
use crate::schema::{synthesize_key, ForeignKey, Index, KeyKind, Table};
use indexmap::IndexMap;
use log::debug;

/// Accumulates the canonical model while change-sets replay.
#[derive(Debug, Default)]
pub struct SchemaCollector {
    tables: IndexMap<String, Table>,
}

impl SchemaCollector {
    pub fn new() -> Self {
        Self {
            tables: IndexMap::new(),
        }
    }

    /// Record a freshly created table. Any existing entry under the same
    /// name is replaced wholesale.
    pub fn create(&mut self, blueprint: &Blueprint) {
        let name = blueprint.table_name();
        let mut table = Table::new(name);
        merge_blueprint(&mut table, blueprint);
        debug!(
            "collected create of '{}' ({} columns)",
            name,
            table.columns.len()
        );
        self.tables.insert(name.to_string(), table);
    }

    /// Record a table alteration: merge new declarations into the existing
    /// entry (creating it when absent), then apply drop and rename
    /// commands.
    pub fn update(&mut self, blueprint: &Blueprint) -> Result<(), ExportError> {
        let name = blueprint.table_name().to_string();
        let position = self.tables.get_index_of(&name);
        let mut table = self
            .tables
            .shift_remove(&name)
            .unwrap_or_else(|| Table::new(&name));

        merge_blueprint(&mut table, blueprint);
        let result = apply_alterations(&mut table, blueprint);

        let (inserted_at, _) = self.tables.insert_full(name, table);
        if let Some(pos) = position {
            self.tables.move_index(inserted_at, pos);
        }
        result
    }

    /// Remove a table. Returns whether an entry existed.
    pub fn drop_table(&mut self, name: &str) -> bool {
        self.tables.shift_remove(name).is_some()
    }

    /// Remove a table, silently ignoring an absent entry.
    pub fn drop_table_if_exists(&mut self, name: &str) {
        if !self.drop_table(name) {
            debug!("drop-if-exists on absent table '{}'", name);
        }
    }

    /// Move a table to a new name and rewrite each index's owning-table
    /// backpointer. A missing source entry is ignored.
    pub fn rename_table(&mut self, from: &str, to: &str) {
        let Some(mut table) = self.tables.shift_remove(from) else {
            debug!("rename of absent table '{}' ignored", from);
            return;
        };
        table.name = to.to_string();
        for index in table.indexes.values_mut() {
            index.table = to.to_string();
        }
        self.tables.insert(to.to_string(), table);
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .map(|t| t.columns.contains_key(column))
            .unwrap_or(false)
    }

    pub fn has_columns(&self, table: &str, columns: &[&str]) -> bool {
        columns.iter().all(|c| self.has_column(table, c))
    }

    pub fn tables(&self) -> &IndexMap<String, Table> {
        &self.tables
    }

    pub fn into_tables(self) -> IndexMap<String, Table> {
        self.tables
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Merge column, key, and foreign-key declarations into the table.
/// Duplicate declarations replace earlier ones.
fn merge_blueprint(table: &mut Table, blueprint: &Blueprint) {
    if let Some(comment) = &blueprint.comment {
        table.comment = Some(comment.clone());
    }

    for spec in &blueprint.columns {
        table.put_column(spec.to_column());
    }

    let table_name = table.name.clone();
    for key in &blueprint.keys {
        let name = key
            .name
            .clone()
            .unwrap_or_else(|| synthesize_key(&table_name, &key.columns, key.kind));
        table.put_index(Index {
            name,
            table: table_name.clone(),
            columns: key.columns.clone(),
            unique: matches!(key.kind, KeyKind::Unique | KeyKind::Primary),
            primary: key.kind == KeyKind::Primary,
        });
    }

    for fk in &blueprint.foreign_keys {
        let name = fk
            .name
            .clone()
            .unwrap_or_else(|| synthesize_key(&table_name, &fk.columns, KeyKind::Foreign));
        table.put_foreign_key(ForeignKey {
            name,
            columns: fk.columns.clone(),
            target_table: fk.target_table.clone(),
            target_columns: fk.target_columns.clone(),
            on_update: fk.on_update.clone(),
            on_delete: fk.on_delete.clone(),
        });
    }
}

/// Apply drop and rename commands after merging.
fn apply_alterations(table: &mut Table, blueprint: &Blueprint) -> Result<(), ExportError> {
    for alter in &blueprint.alters {
        match alter {
            AlterCommand::DropColumn(columns) => {
                for column in columns {
                    table.remove_column(column);
                }
            }
            AlterCommand::DropPrimary => {
                let key = table.primary_index().map(|index| index.name.clone());
                if let Some(key) = key {
                    table.indexes.shift_remove(&key);
                }
            }
            AlterCommand::DropUnique(target) => {
                if !table.remove_index(target, KeyKind::Unique) {
                    debug!("drop of unmatched unique key on '{}' ignored", table.name);
                }
            }
            AlterCommand::DropIndex(target) => {
                if !table.remove_index(target, KeyKind::Index) {
                    debug!("drop of unmatched index on '{}' ignored", table.name);
                }
            }
            AlterCommand::DropForeign(target) => {
                if !table.remove_foreign_key(target) {
                    debug!(
                        "drop of unmatched foreign key on '{}' ignored",
                        table.name
                    );
                }
            }
            AlterCommand::RenameColumn { from, to } => {
                if !table.rename_column(from, to) {
                    return Err(ExportError::CommandApply {
                        table: table.name.clone(),
                        command: "rename_column".to_string(),
                        error: format!("unknown column '{}'", from),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_blueprint() -> Blueprint {
        let mut bp = Blueprint::new("users");
        bp.id();
        bp.string("email").length(191);
        bp.string("name");
        bp.primary(&["id"]);
        bp.unique(&["email"]);
        bp
    }

    #[test]
    fn test_create_builds_table_with_synthesized_keys() {
        let mut collector = SchemaCollector::new();
        collector.create(&users_blueprint());

        let table = collector.tables().get("users").unwrap();
        assert_eq!(table.columns.len(), 3);
        assert!(table.indexes.contains_key("users_id_primary"));
        assert!(table.indexes.contains_key("users_email_unique"));
        assert!(table.indexes.get("users_id_primary").unwrap().primary);
    }

    #[test]
    fn test_create_replaces_existing_entry() {
        let mut collector = SchemaCollector::new();
        collector.create(&users_blueprint());

        let mut replacement = Blueprint::new("users");
        replacement.id();
        collector.create(&replacement);

        let table = collector.tables().get("users").unwrap();
        assert_eq!(table.columns.len(), 1);
        assert!(table.indexes.is_empty());
    }

    #[test]
    fn test_later_column_declaration_overwrites() {
        let mut bp = Blueprint::new("users");
        bp.string("email").length(120);
        bp.text("email");

        let mut collector = SchemaCollector::new();
        collector.create(&bp);

        let table = collector.tables().get("users").unwrap();
        assert_eq!(table.columns.len(), 1);
        assert_eq!(
            table.columns.get("email").unwrap().normalized_type,
            "text"
        );
    }

    #[test]
    fn test_update_merges_into_existing_table() {
        let mut collector = SchemaCollector::new();
        collector.create(&users_blueprint());

        let mut alter = Blueprint::new("users");
        alter.boolean("active").default_bool(false);
        collector.update(&alter).unwrap();

        let table = collector.tables().get("users").unwrap();
        assert_eq!(table.columns.len(), 4);
        assert_eq!(
            table.columns.get("active").unwrap().default,
            Some("0".to_string())
        );
    }

    #[test]
    fn test_update_creates_table_when_absent() {
        let mut collector = SchemaCollector::new();
        let mut alter = Blueprint::new("settings");
        alter.string("key");
        collector.update(&alter).unwrap();
        assert!(collector.has_table("settings"));
    }

    #[test]
    fn test_drop_column_cascades_through_update() {
        let mut collector = SchemaCollector::new();
        let mut bp = Blueprint::new("posts");
        bp.id();
        bp.foreign_id("user_id");
        bp.index(&["user_id"]);
        bp.foreign(&["user_id"]).references(&["id"]).on("users");
        collector.create(&bp);

        let mut alter = Blueprint::new("posts");
        alter.drop_column("user_id");
        collector.update(&alter).unwrap();

        let table = collector.tables().get("posts").unwrap();
        assert!(!table.columns.contains_key("user_id"));
        assert!(table.indexes.is_empty());
        assert!(table.foreign_keys.is_empty());
    }

    #[test]
    fn test_drop_unique_by_columns() {
        let mut collector = SchemaCollector::new();
        collector.create(&users_blueprint());

        let mut alter = Blueprint::new("users");
        alter.drop_unique(["email"]);
        collector.update(&alter).unwrap();

        let table = collector.tables().get("users").unwrap();
        assert!(!table.indexes.contains_key("users_email_unique"));
        assert!(table.indexes.contains_key("users_id_primary"));
    }

    #[test]
    fn test_rename_column_error_names_table_and_command() {
        let mut collector = SchemaCollector::new();
        collector.create(&users_blueprint());

        let mut alter = Blueprint::new("users");
        alter.rename_column("missing", "renamed");
        let err = collector.update(&alter).unwrap_err();
        assert!(err.to_string().contains("users"));
        assert!(err.to_string().contains("rename_column"));
    }

    #[test]
    fn test_rename_table_updates_index_backpointers() {
        let mut collector = SchemaCollector::new();
        collector.create(&users_blueprint());

        collector.rename_table("users", "accounts");

        assert!(!collector.has_table("users"));
        let table = collector.tables().get("accounts").unwrap();
        assert_eq!(table.name, "accounts");
        for index in table.indexes.values() {
            assert_eq!(index.table, "accounts");
        }
    }

    #[test]
    fn test_drop_table_if_exists_is_silent_when_absent() {
        let mut collector = SchemaCollector::new();
        collector.drop_table_if_exists("ghosts");
        assert!(collector.is_empty());

        collector.create(&users_blueprint());
        collector.drop_table_if_exists("users");
        assert!(collector.is_empty());
    }

    #[test]
    fn test_synthesized_foreign_key_dedupes_to_latest() {
        let mut collector = SchemaCollector::new();
        let mut bp = Blueprint::new("posts");
        bp.foreign_id("user_id");
        bp.foreign(&["user_id"]).references(&["id"]).on("users");
        bp.foreign(&["user_id"])
            .references(&["id"])
            .on("users")
            .on_delete("cascade");
        collector.create(&bp);

        let table = collector.tables().get("posts").unwrap();
        assert_eq!(table.foreign_keys.len(), 1);
        let fk = table.foreign_keys.get("posts_user_id_foreign").unwrap();
        assert_eq!(fk.on_delete.as_deref(), Some("cascade"));
    }
}
