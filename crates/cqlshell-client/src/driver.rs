//! The seam between the shell and a CQL driver.
//!
//! The shell never talks to a driver crate directly. It opens sessions
//! through a [`Connector`] and runs statements through the [`DriverSession`]
//! it gets back. The scylla-backed implementation lives in
//! [`crate::connection`]; [`crate::memory`] provides an in-memory one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::error::Error;
use crate::value::{ColumnType, Value};

/// Opens driver sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a session bound to `config.keyspace`.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverSession>, Error>;
}

/// A live driver session bound to a single keyspace.
///
/// Dropping the session releases its connections.
#[async_trait]
pub trait DriverSession: Send + Sync {
    /// Execute one statement. With `tracing` set the driver asks the
    /// coordinator to record a trace and returns its id in the result.
    async fn execute(&self, cql: &str, tracing: bool) -> Result<QueryResult, Error>;

    /// Schema metadata for a keyspace, `None` when it does not exist.
    async fn keyspace_metadata(&self, keyspace: &str) -> Result<Option<KeyspaceMetadata>, Error>;

    /// Keyspace this session was opened against.
    fn keyspace(&self) -> &str;
}

/// Description of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub keyspace: String,
    pub table: String,
    pub typ: ColumnType,
}

impl ColumnSpec {
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        typ: ColumnType,
    ) -> Self {
        Self {
            name: name.into(),
            keyspace: keyspace.into(),
            table: table.into(),
            typ,
        }
    }
}

/// One row, a cell per column in column order. `None` is CQL null.
pub type Row = Vec<Option<Value>>;

/// Fully received result of a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Row>,
    pub tracing_id: Option<Uuid>,
}

impl QueryResult {
    pub fn new(columns: Vec<ColumnSpec>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            tracing_id: None,
        }
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Non-null cell of `row` under column `name`.
    pub fn value<'a>(&self, row: &'a Row, name: &str) -> Option<&'a Value> {
        self.column_index(name)
            .and_then(|i| row.get(i))
            .and_then(|cell| cell.as_ref())
    }
}

/// How a column participates in the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    PartitionKey,
    Clustering,
    Static,
    Regular,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::PartitionKey => "partition_key",
            ColumnKind::Clustering => "clustering",
            ColumnKind::Static => "static",
            ColumnKind::Regular => "regular",
        }
    }
}

/// Display role of a column, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    PartitionKey,
    ClusteringKey,
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    pub typ: ColumnType,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub name: String,
    pub columns: BTreeMap<String, ColumnMetadata>,
    /// Partition key column names in key order.
    pub partition_key: Vec<String>,
    /// Clustering column names in key order.
    pub clustering_key: Vec<String>,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: BTreeMap::new(),
            partition_key: Vec::new(),
            clustering_key: Vec::new(),
        }
    }

    /// Add a column; key columns are appended to their key in call order.
    pub fn with_column(mut self, name: &str, typ: ColumnType, kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::PartitionKey => self.partition_key.push(name.to_string()),
            ColumnKind::Clustering => self.clustering_key.push(name.to_string()),
            ColumnKind::Static | ColumnKind::Regular => {}
        }
        self.columns.insert(
            name.to_string(),
            ColumnMetadata {
                name: name.to_string(),
                typ,
                kind,
            },
        );
        self
    }

    pub fn is_partition_key(&self, column: &str) -> bool {
        self.partition_key.iter().any(|c| c == column)
    }

    pub fn is_clustering_key(&self, column: &str) -> bool {
        self.clustering_key.iter().any(|c| c == column)
    }

    pub fn role(&self, column: &str) -> ColumnRole {
        if self.is_partition_key(column) {
            ColumnRole::PartitionKey
        } else if self.is_clustering_key(column) {
            ColumnRole::ClusteringKey
        } else {
            ColumnRole::Regular
        }
    }

    /// Columns with the partition key first, then clustering columns, both
    /// in key order, then the rest by name.
    pub fn ordered_columns(&self) -> Vec<&ColumnMetadata> {
        let keys = self.partition_key.iter().chain(self.clustering_key.iter());
        let mut ordered: Vec<&ColumnMetadata> =
            keys.filter_map(|name| self.columns.get(name)).collect();
        ordered.extend(
            self.columns
                .values()
                .filter(|c| !self.is_partition_key(&c.name) && !self.is_clustering_key(&c.name)),
        );
        ordered
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceMetadata {
    pub name: String,
    pub tables: BTreeMap<String, TableMetadata>,
}

impl KeyspaceMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, table: TableMetadata) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events_table() -> TableMetadata {
        TableMetadata::new("events")
            .with_column("payload", ColumnType::Blob, ColumnKind::Regular)
            .with_column("day", ColumnType::Date, ColumnKind::PartitionKey)
            .with_column("at", ColumnType::Timestamp, ColumnKind::Clustering)
            .with_column("source", ColumnType::Text, ColumnKind::PartitionKey)
            .with_column("kind", ColumnType::Text, ColumnKind::Static)
    }

    #[test]
    fn test_role_precedence() {
        let table = events_table();
        assert_eq!(table.role("day"), ColumnRole::PartitionKey);
        assert_eq!(table.role("at"), ColumnRole::ClusteringKey);
        assert_eq!(table.role("payload"), ColumnRole::Regular);
        assert_eq!(table.role("kind"), ColumnRole::Regular);
        assert_eq!(table.role("missing"), ColumnRole::Regular);
    }

    #[test]
    fn test_ordered_columns() {
        let table = events_table();
        let names: Vec<&str> = table
            .ordered_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["day", "source", "at", "kind", "payload"]);
    }

    #[test]
    fn test_result_lookup() {
        let result = QueryResult::new(
            vec![
                ColumnSpec::new("ks", "t", "id", ColumnType::Int),
                ColumnSpec::new("ks", "t", "name", ColumnType::Text),
            ],
            vec![vec![Some(Value::Int(1)), None]],
        );
        let row = &result.rows[0];
        assert_eq!(result.value(row, "id"), Some(&Value::Int(1)));
        assert_eq!(result.value(row, "name"), None);
        assert_eq!(result.value(row, "nope"), None);
    }
}
