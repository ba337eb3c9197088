//! Declarative table blueprints
//!
//! A `Blueprint` accumulates column declarations and structural commands
//! while a change-set runs. Nothing is executed; the recorder hands the
//! finished blueprint to the collector, which folds it into the canonical
//! model.

use crate::schema::{stringify_default, Column, KeyKind, NameOrColumns};
use serde_json::Value;

/// Column type vocabulary available to change-sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    BigIncrements,
    Increments,
    MediumIncrements,
    SmallIncrements,
    TinyIncrements,
    Id,
    ForeignId,
    ForeignUuid,
    ForeignUlid,
    UnsignedBigInteger,
    UnsignedInteger,
    UnsignedMediumInteger,
    UnsignedSmallInteger,
    UnsignedTinyInteger,
    String,
    Char,
    Text,
    Integer,
    BigInteger,
    MediumInteger,
    SmallInteger,
    TinyInteger,
    Boolean,
    Date,
    DateTime,
    Timestamp,
    Time,
    Decimal,
    Float,
    Double,
    Json,
    Jsonb,
    Uuid,
    Ulid,
    Binary,
    Enum,
}

impl ColumnKind {
    /// The verb name as declared in a change-set.
    pub fn raw(&self) -> &'static str {
        match self {
            ColumnKind::BigIncrements => "big_increments",
            ColumnKind::Increments => "increments",
            ColumnKind::MediumIncrements => "medium_increments",
            ColumnKind::SmallIncrements => "small_increments",
            ColumnKind::TinyIncrements => "tiny_increments",
            ColumnKind::Id => "id",
            ColumnKind::ForeignId => "foreign_id",
            ColumnKind::ForeignUuid => "foreign_uuid",
            ColumnKind::ForeignUlid => "foreign_ulid",
            ColumnKind::UnsignedBigInteger => "unsigned_big_integer",
            ColumnKind::UnsignedInteger => "unsigned_integer",
            ColumnKind::UnsignedMediumInteger => "unsigned_medium_integer",
            ColumnKind::UnsignedSmallInteger => "unsigned_small_integer",
            ColumnKind::UnsignedTinyInteger => "unsigned_tiny_integer",
            ColumnKind::String => "string",
            ColumnKind::Char => "char",
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::BigInteger => "big_integer",
            ColumnKind::MediumInteger => "medium_integer",
            ColumnKind::SmallInteger => "small_integer",
            ColumnKind::TinyInteger => "tiny_integer",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Date => "date",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Time => "time",
            ColumnKind::Decimal => "decimal",
            ColumnKind::Float => "float",
            ColumnKind::Double => "double",
            ColumnKind::Json => "json",
            ColumnKind::Jsonb => "jsonb",
            ColumnKind::Uuid => "uuid",
            ColumnKind::Ulid => "ulid",
            ColumnKind::Binary => "binary",
            ColumnKind::Enum => "enum",
        }
    }

    /// Provider-neutral type for the verb. Verbs without a dedicated
    /// mapping keep their raw name.
    pub fn normalized(&self) -> &'static str {
        match self {
            ColumnKind::BigIncrements | ColumnKind::Id | ColumnKind::ForeignId => "bigint",
            ColumnKind::Increments => "int",
            ColumnKind::MediumIncrements => "mediumint",
            ColumnKind::SmallIncrements => "smallint",
            ColumnKind::TinyIncrements => "tinyint",
            ColumnKind::ForeignUuid => "uuid",
            ColumnKind::ForeignUlid => "ulid",
            ColumnKind::UnsignedBigInteger => "bigint",
            ColumnKind::UnsignedInteger => "int",
            ColumnKind::UnsignedMediumInteger => "mediumint",
            ColumnKind::UnsignedSmallInteger => "smallint",
            ColumnKind::UnsignedTinyInteger => "tinyint",
            other => other.raw(),
        }
    }

    /// Whether the verb implies an unsigned column.
    fn implies_unsigned(&self) -> bool {
        matches!(
            self,
            ColumnKind::BigIncrements
                | ColumnKind::Increments
                | ColumnKind::MediumIncrements
                | ColumnKind::SmallIncrements
                | ColumnKind::TinyIncrements
                | ColumnKind::Id
                | ColumnKind::ForeignId
                | ColumnKind::UnsignedBigInteger
                | ColumnKind::UnsignedInteger
                | ColumnKind::UnsignedMediumInteger
                | ColumnKind::UnsignedSmallInteger
                | ColumnKind::UnsignedTinyInteger
        )
    }

    /// Whether the verb implies auto-increment.
    fn implies_auto_increment(&self) -> bool {
        matches!(
            self,
            ColumnKind::BigIncrements
                | ColumnKind::Increments
                | ColumnKind::MediumIncrements
                | ColumnKind::SmallIncrements
                | ColumnKind::TinyIncrements
                | ColumnKind::Id
        )
    }
}

/// A single column declaration under construction.
///
/// Returned by the column verbs on [`Blueprint`]; modifiers chain on the
/// mutable reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub default: Option<Value>,
    pub unsigned: bool,
    pub auto_increment: bool,
    pub comment: Option<String>,
}

impl ColumnSpec {
    fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            length: None,
            precision: None,
            scale: None,
            nullable: false,
            default: None,
            unsigned: kind.implies_unsigned(),
            auto_increment: kind.implies_auto_increment(),
            comment: None,
        }
    }

    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    pub fn length(&mut self, length: u32) -> &mut Self {
        self.length = Some(length);
        self
    }

    pub fn precision_scale(&mut self, precision: u32, scale: u32) -> &mut Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn unsigned(&mut self) -> &mut Self {
        self.unsigned = true;
        self
    }

    pub fn auto_increment(&mut self) -> &mut Self {
        self.auto_increment = true;
        self
    }

    pub fn default_bool(&mut self, value: bool) -> &mut Self {
        self.default = Some(Value::Bool(value));
        self
    }

    pub fn default_int(&mut self, value: i64) -> &mut Self {
        self.default = Some(Value::from(value));
        self
    }

    pub fn default_float(&mut self, value: f64) -> &mut Self {
        self.default = Some(Value::from(value));
        self
    }

    pub fn default_str(&mut self, value: &str) -> &mut Self {
        self.default = Some(Value::String(value.to_string()));
        self
    }

    pub fn default_json(&mut self, value: Value) -> &mut Self {
        self.default = Some(value);
        self
    }

    pub fn comment(&mut self, text: &str) -> &mut Self {
        self.comment = Some(text.to_string());
        self
    }

    /// Materialize the declaration as a canonical column.
    pub fn to_column(&self) -> Column {
        Column {
            name: self.name.clone(),
            raw_type: self.kind.raw().to_string(),
            normalized_type: self.kind.normalized().to_string(),
            length: self.length,
            precision: self.precision,
            scale: self.scale,
            nullable: self.nullable,
            default: self.default.as_ref().and_then(stringify_default),
            unsigned: self.unsigned,
            auto_increment: self.auto_increment,
            comment: self.comment.clone(),
        }
    }
}

/// A primary/unique/plain index declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub kind: KeyKind,
    pub columns: Vec<String>,
    pub name: Option<String>,
}

impl IndexSpec {
    /// Give the key an explicit name instead of the synthesized one.
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_string());
        self
    }
}

/// A foreign-key declaration under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignSpec {
    pub columns: Vec<String>,
    pub name: Option<String>,
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

impl ForeignSpec {
    pub fn references(&mut self, columns: &[&str]) -> &mut Self {
        self.target_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn on(&mut self, table: &str) -> &mut Self {
        self.target_table = table.to_string();
        self
    }

    pub fn on_update(&mut self, action: &str) -> &mut Self {
        self.on_update = Some(action.to_string());
        self
    }

    pub fn on_delete(&mut self, action: &str) -> &mut Self {
        self.on_delete = Some(action.to_string());
        self
    }

    pub fn name(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_string());
        self
    }
}

/// Alteration commands applied after column/key merging.
#[derive(Debug, Clone, PartialEq)]
pub enum AlterCommand {
    DropColumn(Vec<String>),
    DropPrimary,
    DropUnique(NameOrColumns),
    DropIndex(NameOrColumns),
    DropForeign(NameOrColumns),
    RenameColumn { from: String, to: String },
}

/// Declarative description of a table, filled in by a change-set closure.
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    table: String,
    pub(crate) comment: Option<String>,
    pub(crate) columns: Vec<ColumnSpec>,
    pub(crate) keys: Vec<IndexSpec>,
    pub(crate) foreign_keys: Vec<ForeignSpec>,
    pub(crate) alters: Vec<AlterCommand>,
}

impl Blueprint {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            comment: None,
            columns: Vec::new(),
            keys: Vec::new(),
            foreign_keys: Vec::new(),
            alters: Vec::new(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    fn add_column(&mut self, name: &str, kind: ColumnKind) -> &mut ColumnSpec {
        self.columns.push(ColumnSpec::new(name, kind));
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    // Auto-incrementing keys

    pub fn id(&mut self) -> &mut ColumnSpec {
        self.add_column("id", ColumnKind::Id)
    }

    pub fn big_increments(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::BigIncrements)
    }

    pub fn increments(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Increments)
    }

    pub fn medium_increments(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::MediumIncrements)
    }

    pub fn small_increments(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::SmallIncrements)
    }

    pub fn tiny_increments(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::TinyIncrements)
    }

    // Reference columns

    pub fn foreign_id(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::ForeignId)
    }

    pub fn foreign_uuid(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::ForeignUuid)
    }

    pub fn foreign_ulid(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::ForeignUlid)
    }

    // Unsigned integers

    pub fn unsigned_big_integer(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::UnsignedBigInteger)
    }

    pub fn unsigned_integer(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::UnsignedInteger)
    }

    pub fn unsigned_medium_integer(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::UnsignedMediumInteger)
    }

    pub fn unsigned_small_integer(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::UnsignedSmallInteger)
    }

    pub fn unsigned_tiny_integer(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::UnsignedTinyInteger)
    }

    // Scalars

    pub fn string(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::String)
    }

    pub fn char(&mut self, name: &str, length: u32) -> &mut ColumnSpec {
        let spec = self.add_column(name, ColumnKind::Char);
        spec.length = Some(length);
        spec
    }

    pub fn text(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Text)
    }

    pub fn integer(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Integer)
    }

    pub fn big_integer(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::BigInteger)
    }

    pub fn medium_integer(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::MediumInteger)
    }

    pub fn small_integer(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::SmallInteger)
    }

    pub fn tiny_integer(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::TinyInteger)
    }

    pub fn boolean(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Boolean)
    }

    pub fn date(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Date)
    }

    pub fn datetime(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::DateTime)
    }

    pub fn timestamp(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Timestamp)
    }

    /// Adds the conventional nullable `created_at` / `updated_at` pair.
    pub fn timestamps(&mut self) {
        self.timestamp("created_at").nullable();
        self.timestamp("updated_at").nullable();
    }

    pub fn time(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Time)
    }

    pub fn decimal(&mut self, name: &str, precision: u32, scale: u32) -> &mut ColumnSpec {
        let spec = self.add_column(name, ColumnKind::Decimal);
        spec.precision = Some(precision);
        spec.scale = Some(scale);
        spec
    }

    pub fn float(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Float)
    }

    pub fn double(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Double)
    }

    pub fn json(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Json)
    }

    pub fn jsonb(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Jsonb)
    }

    pub fn uuid(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Uuid)
    }

    pub fn ulid(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Ulid)
    }

    pub fn binary(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Binary)
    }

    pub fn enumeration(&mut self, name: &str) -> &mut ColumnSpec {
        self.add_column(name, ColumnKind::Enum)
    }

    // Structural keys

    fn add_key(&mut self, kind: KeyKind, columns: &[&str]) -> &mut IndexSpec {
        self.keys.push(IndexSpec {
            kind,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            name: None,
        });
        let last = self.keys.len() - 1;
        &mut self.keys[last]
    }

    pub fn primary(&mut self, columns: &[&str]) -> &mut IndexSpec {
        self.add_key(KeyKind::Primary, columns)
    }

    pub fn unique(&mut self, columns: &[&str]) -> &mut IndexSpec {
        self.add_key(KeyKind::Unique, columns)
    }

    pub fn index(&mut self, columns: &[&str]) -> &mut IndexSpec {
        self.add_key(KeyKind::Index, columns)
    }

    pub fn foreign(&mut self, columns: &[&str]) -> &mut ForeignSpec {
        self.foreign_keys.push(ForeignSpec {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            name: None,
            target_table: String::new(),
            target_columns: Vec::new(),
            on_update: None,
            on_delete: None,
        });
        let last = self.foreign_keys.len() - 1;
        &mut self.foreign_keys[last]
    }

    // Alterations

    pub fn drop_column(&mut self, name: &str) {
        self.alters
            .push(AlterCommand::DropColumn(vec![name.to_string()]));
    }

    pub fn drop_columns(&mut self, names: &[&str]) {
        self.alters.push(AlterCommand::DropColumn(
            names.iter().map(|n| n.to_string()).collect(),
        ));
    }

    pub fn drop_primary(&mut self) {
        self.alters.push(AlterCommand::DropPrimary);
    }

    pub fn drop_unique(&mut self, target: impl Into<NameOrColumns>) {
        self.alters.push(AlterCommand::DropUnique(target.into()));
    }

    pub fn drop_index(&mut self, target: impl Into<NameOrColumns>) {
        self.alters.push(AlterCommand::DropIndex(target.into()));
    }

    pub fn drop_foreign(&mut self, target: impl Into<NameOrColumns>) {
        self.alters.push(AlterCommand::DropForeign(target.into()));
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        self.alters.push(AlterCommand::RenameColumn {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    pub fn comment(&mut self, text: &str) {
        self.comment = Some(text.to_string());
    }
}

impl From<&str> for NameOrColumns {
    fn from(name: &str) -> Self {
        NameOrColumns::Name(name.to_string())
    }
}

impl<const N: usize> From<[&str; N]> for NameOrColumns {
    fn from(columns: [&str; N]) -> Self {
        NameOrColumns::Columns(columns.iter().map(|c| c.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_implies_auto_increment_and_unsigned() {
        let mut bp = Blueprint::new("users");
        bp.id();
        let spec = &bp.columns[0];
        assert_eq!(spec.name, "id");
        assert!(spec.auto_increment);
        assert!(spec.unsigned);
        assert_eq!(spec.kind.normalized(), "bigint");
    }

    #[test]
    fn test_foreign_id_is_unsigned_but_not_auto_increment() {
        let mut bp = Blueprint::new("posts");
        bp.foreign_id("user_id");
        let spec = &bp.columns[0];
        assert!(spec.unsigned);
        assert!(!spec.auto_increment);
        assert_eq!(spec.kind.normalized(), "bigint");
    }

    #[test]
    fn test_plain_verbs_keep_their_raw_name() {
        assert_eq!(ColumnKind::BigInteger.normalized(), "big_integer");
        assert_eq!(ColumnKind::String.normalized(), "string");
        assert_eq!(ColumnKind::UnsignedInteger.normalized(), "int");
    }

    #[test]
    fn test_column_modifiers_chain() {
        let mut bp = Blueprint::new("users");
        bp.string("email").length(120).nullable().default_str("none");
        let col = bp.columns[0].to_column();
        assert_eq!(col.length, Some(120));
        assert!(col.nullable);
        assert_eq!(col.default, Some("none".to_string()));
        assert_eq!(col.type_definition(), "string(120)");
    }

    #[test]
    fn test_decimal_records_precision_and_scale() {
        let mut bp = Blueprint::new("orders");
        bp.decimal("total", 8, 2);
        let col = bp.columns[0].to_column();
        assert_eq!(col.type_definition(), "decimal(8,2)");
    }

    #[test]
    fn test_default_bool_stringifies_to_digit() {
        let mut bp = Blueprint::new("users");
        bp.boolean("active").default_bool(true);
        let col = bp.columns[0].to_column();
        assert_eq!(col.default, Some("1".to_string()));
    }

    #[test]
    fn test_timestamps_adds_nullable_pair() {
        let mut bp = Blueprint::new("users");
        bp.timestamps();
        assert_eq!(bp.columns.len(), 2);
        assert!(bp.columns.iter().all(|c| c.nullable));
    }

    #[test]
    fn test_foreign_builder_collects_target() {
        let mut bp = Blueprint::new("posts");
        bp.foreign(&["user_id"])
            .references(&["id"])
            .on("users")
            .on_delete("cascade");
        let fk = &bp.foreign_keys[0];
        assert_eq!(fk.target_table, "users");
        assert_eq!(fk.target_columns, vec!["id".to_string()]);
        assert_eq!(fk.on_delete.as_deref(), Some("cascade"));
    }

    #[test]
    fn test_drop_targets_convert_from_name_and_columns() {
        let mut bp = Blueprint::new("users");
        bp.drop_unique("users_email_unique");
        bp.drop_index(["email", "tenant"]);
        assert_eq!(
            bp.alters[0],
            AlterCommand::DropUnique(NameOrColumns::Name("users_email_unique".to_string()))
        );
        assert_eq!(
            bp.alters[1],
            AlterCommand::DropIndex(NameOrColumns::Columns(vec![
                "email".to_string(),
                "tenant".to_string()
            ]))
        );
    }
}
