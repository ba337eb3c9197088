//! PostgreSQL catalog source
//!
//! Reads the server's own catalogs (`pg_class`, `pg_index`,
//! `information_schema`) and hands them to the inspector as generic
//! tabular rows. Works over a blocking `may_postgres::Client`.

use crate::inspect::{CatalogError, CatalogSource, ReflectionStrategy};
use log::debug;
use may_postgres::types::ToSql;
use may_postgres::Client;
use serde_json::{json, Map, Value};

const TABLE_QUERY: &str = "\
SELECT c.relname::text AS name,
       obj_description(c.oid, 'pg_class') AS comment
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind = 'r'
  AND n.nspname = 'public'
ORDER BY c.relname";

const COLUMN_QUERY: &str = "\
SELECT column_name::text AS name,
       udt_name::text AS type_name,
       data_type::text AS data_type,
       character_maximum_length::int4 AS length,
       numeric_precision::int4 AS precision,
       numeric_scale::int4 AS scale,
       (is_nullable = 'YES') AS nullable,
       column_default::text AS \"default\",
       COALESCE(column_default LIKE 'nextval(%', false) AS auto_increment
FROM information_schema.columns
WHERE table_schema = 'public'
  AND table_name = $1
ORDER BY ordinal_position";

const INDEX_QUERY: &str = "\
SELECT ic.relname::text AS name,
       string_agg(a.attname::text, ',' ORDER BY k.ord) AS columns,
       i.indisunique AS \"unique\",
       i.indisprimary AS \"primary\"
FROM pg_index i
JOIN pg_class ic ON ic.oid = i.indexrelid
JOIN pg_class tc ON tc.oid = i.indrelid
JOIN pg_namespace n ON n.oid = tc.relnamespace
JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
JOIN pg_attribute a ON a.attrelid = tc.oid AND a.attnum = k.attnum
WHERE n.nspname = 'public'
  AND tc.relname = $1
GROUP BY ic.relname, i.indisunique, i.indisprimary
ORDER BY ic.relname";

/// One constraint column pair per row; grouped into whole keys in Rust.
const FOREIGN_KEY_QUERY: &str = "\
SELECT tc.constraint_name::text AS name,
       kcu.column_name::text AS \"column\",
       ccu.table_name::text AS referenced_table_name,
       ccu.column_name::text AS referenced_column,
       rc.update_rule::text AS on_update,
       rc.delete_rule::text AS on_delete
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON kcu.constraint_name = tc.constraint_name
 AND kcu.constraint_schema = tc.constraint_schema
JOIN information_schema.referential_constraints rc
  ON rc.constraint_name = tc.constraint_name
 AND rc.constraint_schema = tc.constraint_schema
JOIN information_schema.constraint_column_usage ccu
  ON ccu.constraint_name = tc.constraint_name
 AND ccu.constraint_schema = tc.constraint_schema
WHERE tc.constraint_type = 'FOREIGN KEY'
  AND tc.table_schema = 'public'
  AND tc.table_name = $1
ORDER BY tc.constraint_name, kcu.ordinal_position";

/// Tabular catalog source backed by a live PostgreSQL connection.
pub struct PostgresSource {
    client: Client,
}

impl PostgresSource {
    /// Connect to the server and wrap the client.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Postgres` when the connection fails.
    pub fn connect(url: &str) -> Result<Self, CatalogError> {
        let client = may_postgres::connect(url)?;
        Ok(Self { client })
    }

    /// Wrap an already established client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn query(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<may_postgres::Row>, CatalogError> {
        debug!("catalog query: {}", query.lines().next().unwrap_or(query));
        Ok(self.client.query(query, params)?)
    }
}

impl CatalogSource for PostgresSource {
    fn driver(&self) -> &str {
        "postgres"
    }

    fn reflection(&self) -> Option<ReflectionStrategy> {
        Some(ReflectionStrategy::Tabular)
    }

    fn table_rows(&mut self) -> Result<Vec<Value>, CatalogError> {
        let rows = self.query(TABLE_QUERY, &[])?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            let comment: Option<String> = row.try_get(1)?;
            out.push(json!({ "name": name, "comment": comment }));
        }
        Ok(out)
    }

    fn column_rows(&mut self, table: &str) -> Result<Vec<Value>, CatalogError> {
        let rows = self.query(COLUMN_QUERY, &[&table])?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            let type_name: String = row.try_get(1)?;
            let data_type: String = row.try_get(2)?;
            let length: Option<i32> = row.try_get(3)?;
            let precision: Option<i32> = row.try_get(4)?;
            let scale: Option<i32> = row.try_get(5)?;
            let nullable: bool = row.try_get(6)?;
            let default: Option<String> = row.try_get(7)?;
            let auto_increment: bool = row.try_get(8)?;
            out.push(json!({
                "name": name,
                "type_name": type_name,
                "type": data_type,
                "length": length,
                "precision": precision,
                "scale": scale,
                "nullable": nullable,
                "default": default,
                "auto_increment": auto_increment,
            }));
        }
        Ok(out)
    }

    fn index_rows(&mut self, table: &str) -> Result<Vec<Value>, CatalogError> {
        let rows = self.query(INDEX_QUERY, &[&table])?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            let columns: Option<String> = row.try_get(1)?;
            let unique: bool = row.try_get(2)?;
            let primary: bool = row.try_get(3)?;
            out.push(json!({
                "name": name,
                "columns": columns.unwrap_or_default(),
                "unique": unique,
                "primary": primary,
            }));
        }
        Ok(out)
    }

    fn foreign_key_rows(&mut self, table: &str) -> Result<Vec<Value>, CatalogError> {
        let rows = self.query(FOREIGN_KEY_QUERY, &[&table])?;
        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            let column: String = row.try_get(1)?;
            let referenced_table: String = row.try_get(2)?;
            let referenced_column: String = row.try_get(3)?;
            let on_update: String = row.try_get(4)?;
            let on_delete: String = row.try_get(5)?;
            pairs.push(ConstraintPair {
                name,
                column,
                referenced_table,
                referenced_column,
                on_update,
                on_delete,
            });
        }
        Ok(group_constraint_pairs(pairs))
    }
}

/// One column pairing inside a foreign-key constraint, as the catalog
/// reports it.
#[derive(Debug, Clone)]
struct ConstraintPair {
    name: String,
    column: String,
    referenced_table: String,
    referenced_column: String,
    on_update: String,
    on_delete: String,
}

/// Fold per-column constraint rows into one row per constraint,
/// preserving first-seen constraint order and column order within each.
fn group_constraint_pairs(pairs: Vec<ConstraintPair>) -> Vec<Value> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: Map<String, Value> = Map::new();

    for pair in pairs {
        if !grouped.contains_key(&pair.name) {
            order.push(pair.name.clone());
            grouped.insert(
                pair.name.clone(),
                json!({
                    "name": pair.name,
                    "columns": [],
                    "referenced_table_name": pair.referenced_table,
                    "referenced_columns": [],
                    "on_update": rule_to_action(&pair.on_update),
                    "on_delete": rule_to_action(&pair.on_delete),
                }),
            );
        }
        let entry = grouped.get_mut(&pair.name).expect("inserted above");
        if let Some(columns) = entry.get_mut("columns").and_then(Value::as_array_mut) {
            columns.push(Value::String(pair.column));
        }
        if let Some(refs) = entry
            .get_mut("referenced_columns")
            .and_then(Value::as_array_mut)
        {
            refs.push(Value::String(pair.referenced_column));
        }
    }

    order
        .into_iter()
        .filter_map(|name| grouped.remove(&name))
        .collect()
}

/// Lowercase a referential rule; `NO ACTION` means the constraint has no
/// explicit action and is dropped.
fn rule_to_action(rule: &str) -> Option<String> {
    let lowered = rule.to_lowercase();
    if lowered == "no action" {
        None
    } else {
        Some(lowered)
    }
}
