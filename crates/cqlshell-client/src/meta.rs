//! Read-only schema lookups on a [`KeyspaceSession`].

use std::collections::BTreeMap;

use tracing::debug;

use crate::driver::{ColumnMetadata, ColumnRole, ColumnSpec, KeyspaceMetadata, TableMetadata};
use crate::error::Error;
use crate::session::KeyspaceSession;
use crate::value::Value;

/// Where the cluster keeps its keyspace catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    /// `system.schema_keyspaces` (Cassandra before 3.0).
    Legacy,
    /// `system_schema.keyspaces`.
    Current,
}

impl SchemaGeneration {
    pub fn keyspaces_query(&self) -> &'static str {
        match self {
            SchemaGeneration::Legacy => "SELECT keyspace_name FROM system.schema_keyspaces",
            SchemaGeneration::Current => "SELECT keyspace_name FROM system_schema.keyspaces",
        }
    }
}

impl KeyspaceSession {
    /// Schema layout of the cluster, probed once per bound keyspace.
    pub async fn schema_generation(&self) -> Result<SchemaGeneration, Error> {
        let driver = self.driver();
        self.schema_cache()
            .get_or_try_init(|| async move {
                let system = driver.keyspace_metadata("system").await?;
                let legacy = system
                    .map(|ks| ks.tables.contains_key("schema_keyspaces"))
                    .unwrap_or(false);
                let generation = if legacy {
                    SchemaGeneration::Legacy
                } else {
                    SchemaGeneration::Current
                };
                debug!(?generation, "schema generation detected");
                Ok::<_, Error>(generation)
            })
            .await
            .copied()
    }

    /// Names of all keyspaces, in the order the cluster returns them.
    pub async fn list_keyspaces(&self) -> Result<Vec<String>, Error> {
        let generation = self.schema_generation().await?;
        let result = self.execute(generation.keyspaces_query()).await?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| match result.value(row, "keyspace_name") {
                Some(Value::Text(name)) | Some(Value::Ascii(name)) => Some(name.clone()),
                _ => None,
            })
            .collect())
    }

    /// Metadata of a keyspace.
    pub async fn keyspace_metadata(&self, keyspace: &str) -> Result<KeyspaceMetadata, Error> {
        self.driver()
            .keyspace_metadata(keyspace)
            .await?
            .ok_or_else(|| Error::NotFound(format!("keyspace {keyspace}")))
    }

    /// Metadata of `keyspace.table`.
    pub async fn table_metadata(&self, keyspace: &str, table: &str) -> Result<TableMetadata, Error> {
        let mut ks = self.keyspace_metadata(keyspace).await?;
        ks.tables
            .remove(table)
            .ok_or_else(|| Error::NotFound(format!("table {keyspace}.{table}")))
    }

    /// Sorted table names of the active keyspace. Empty when the keyspace has
    /// no metadata.
    pub async fn list_tables(&self) -> Result<Vec<String>, Error> {
        match self.keyspace_metadata(self.active_keyspace()).await {
            Ok(ks) => Ok(ks.tables.into_keys().collect()),
            Err(Error::NotFound(what)) => {
                debug!(%what, "no metadata for active keyspace");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Columns of a table in the active keyspace, keyed by name.
    pub async fn list_columns(&self, table: &str) -> Result<BTreeMap<String, ColumnMetadata>, Error> {
        let table = self.table_metadata(self.active_keyspace(), table).await?;
        Ok(table.columns)
    }

    /// Key role of a result column. Anything that cannot be resolved is
    /// [`ColumnRole::Regular`].
    pub async fn column_role(&self, column: &ColumnSpec) -> ColumnRole {
        match self.table_metadata(&column.keyspace, &column.table).await {
            Ok(table) => table.role(&column.name),
            Err(e) => {
                debug!(column = %column.name, error = %e, "column role lookup missed");
                ColumnRole::Regular
            }
        }
    }
}
