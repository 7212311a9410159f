//! # vulnsrv dataset
//!
//! The static dataset description that the vulnsrv core replays into its
//! embedded engine on every reset.
//!
//! A description is a set of tables, each with an ordered column list
//! (name plus declared SQL type) and an ordered list of seed rows. It is
//! loaded once at process start, never mutated, and consumed on every
//! reset to regenerate `CREATE TABLE` and `INSERT` statements.
//!
//! All seed values are strings; the engine's column affinity decides how
//! they are stored. Seed row order is significant and preserved.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use error::{DatasetError, DatasetResult};

use serde::Deserialize;
use std::collections::BTreeMap;

/// The built-in seed description, the one the training exercises expect.
const BUILTIN_SEED: &str = include_str!("../data/seed.json");

/// One column of a table description.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Declared SQL type, copied verbatim into the DDL.
    #[serde(rename = "type")]
    pub ty: String,
}

/// One table of the dataset: ordered columns plus ordered seed rows.
///
/// Seed rows map column names to string values. Columns absent from a
/// row (such as an `INTEGER PRIMARY KEY` id) are left to the engine.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TableSpec {
    /// Ordered column list.
    pub structure: Vec<ColumnSpec>,
    /// Ordered seed rows, column name to string value.
    pub data: Vec<BTreeMap<String, String>>,
}

impl TableSpec {
    /// Renders the `CREATE TABLE` statement for this table.
    pub fn create_table_sql(&self, name: &str) -> DatasetResult<String> {
        if self.structure.is_empty() {
            return Err(DatasetError::empty_structure(name));
        }
        let cols = self
            .structure
            .iter()
            .map(|col| format!("{} {}", col.name, col.ty))
            .collect::<Vec<_>>()
            .join(",");
        Ok(format!("CREATE TABLE {name} ({cols})"))
    }

    /// Renders the `INSERT` statement for one seed row.
    ///
    /// Values are single-quoted with `''` escaping. The statements are
    /// assembled as plain text on purpose: the rebuilt tables feed an
    /// injection training exercise, and the reset path must go through
    /// the same textual statement interface as every other caller.
    pub fn insert_row_sql(&self, name: &str, row: &BTreeMap<String, String>) -> String {
        let columns = row.keys().cloned().collect::<Vec<_>>().join(",");
        let values = row
            .values()
            .map(|v| format!("'{}'", v.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(",");
        format!("INSERT INTO {name} ({columns}) VALUES({values})")
    }
}

/// A complete dataset description: table name to table spec.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Dataset {
    tables: BTreeMap<String, TableSpec>,
}

impl Dataset {
    /// Parses a dataset description from its JSON wire form.
    ///
    /// The wire shape matches the historical blob:
    /// `{"messages": {"structure": [{"name", "type"}], "data": [{col: val}]}}`.
    pub fn from_json(json: &str) -> DatasetResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the built-in seed dataset.
    ///
    /// The embedded blob is validated by this crate's tests, so parsing
    /// it cannot fail in a released build.
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_SEED).expect("embedded seed dataset is valid")
    }

    /// Iterates over tables in deterministic (name) order.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableSpec)> {
        self.tables.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Looks up a single table description.
    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.get(name)
    }

    /// Renders the full statement sequence that rebuilds the dataset:
    /// for each table its `CREATE TABLE`, then one `INSERT` per seed row
    /// in seed order.
    pub fn rebuild_statements(&self) -> DatasetResult<Vec<String>> {
        let mut statements = Vec::new();
        for (name, spec) in self.tables() {
            statements.push(spec.create_table_sql(name)?);
            for row in &spec.data {
                statements.push(spec.insert_row_sql(name, row));
            }
        }
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_seed_parses() {
        let dataset = Dataset::builtin();
        let messages = dataset.table("messages").unwrap();
        assert_eq!(messages.structure.len(), 3);
        assert_eq!(messages.structure[0].name, "id");
        assert_eq!(messages.structure[0].ty, "INTEGER PRIMARY KEY");
        assert_eq!(messages.data.len(), 5);
        assert_eq!(messages.data[0]["user"], "web");
        assert_eq!(messages.data[0]["msg"], "Hello, database world");
    }

    #[test]
    fn create_table_sql_shape() {
        let dataset = Dataset::builtin();
        let messages = dataset.table("messages").unwrap();
        assert_eq!(
            messages.create_table_sql("messages").unwrap(),
            "CREATE TABLE messages (id INTEGER PRIMARY KEY,user TEXT,msg TEXT)"
        );
    }

    #[test]
    fn insert_escapes_single_quotes() {
        let dataset = Dataset::builtin();
        let messages = dataset.table("messages").unwrap();
        // "You can't see hidden messages" carries an apostrophe.
        let row = &messages.data[3];
        let sql = messages.insert_row_sql("messages", row);
        assert!(sql.contains("''"), "apostrophe must be doubled: {sql}");
        assert!(sql.starts_with("INSERT INTO messages ("));
    }

    #[test]
    fn rebuild_statements_order() {
        let dataset = Dataset::builtin();
        let statements = dataset.rebuild_statements().unwrap();
        // One CREATE plus five INSERTs.
        assert_eq!(statements.len(), 6);
        assert!(statements[0].starts_with("CREATE TABLE messages"));
        assert!(statements[1..].iter().all(|s| s.starts_with("INSERT INTO messages")));
        assert!(statements[1].contains("Hello, database world"));
        assert!(statements[5].contains("SQL injections"));
    }

    #[test]
    fn empty_structure_rejected() {
        let json = r#"{"empty": {"structure": [], "data": []}}"#;
        let dataset = Dataset::from_json(json).unwrap();
        let err = dataset.rebuild_statements().unwrap_err();
        assert!(matches!(err, DatasetError::EmptyStructure { .. }));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            Dataset::from_json("not json"),
            Err(DatasetError::Parse(_))
        ));
    }
}
