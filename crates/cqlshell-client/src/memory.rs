//! An in-memory cluster.
//!
//! [`MemoryCluster`] answers statements from canned result sets and serves
//! schema metadata from fixtures. It keeps a log of every executed statement
//! and counts open sessions, which makes it a convenient stand-in for a real
//! cluster when exercising the shell offline.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::driver::{
    ColumnKind, ColumnSpec, Connector, DriverSession, KeyspaceMetadata, QueryResult,
    TableMetadata,
};
use crate::error::Error;
use crate::value::{ColumnType, Value};

const CURRENT_KEYSPACES_QUERY: &str = "select keyspace_name from system_schema.keyspaces";
const LEGACY_KEYSPACES_QUERY: &str = "select keyspace_name from system.schema_keyspaces";

/// A statement seen by a memory session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    /// Id of the session that ran it, in connection order starting at 1.
    pub session_id: u64,
    pub keyspace: String,
    pub cql: String,
    pub tracing: bool,
}

#[derive(Default)]
struct ClusterState {
    keyspaces: BTreeMap<String, KeyspaceMetadata>,
    responses: Vec<(String, QueryResult)>,
    failures: Vec<(String, String)>,
    unreachable: HashSet<String>,
    refuse_connections: bool,
    legacy_schema: bool,
    trace_id: Option<Uuid>,
    executed: Vec<ExecutedStatement>,
    sessions_opened: u64,
    open_sessions: usize,
}

/// Shared handle to an in-memory cluster. Clones see the same state.
#[derive(Clone)]
pub struct MemoryCluster {
    state: Arc<Mutex<ClusterState>>,
}

fn normalize(cql: &str) -> String {
    cql.trim().trim_end_matches(';').trim().to_lowercase()
}

fn system_keyspace() -> KeyspaceMetadata {
    KeyspaceMetadata::new("system").with_table(
        TableMetadata::new("local")
            .with_column("key", ColumnType::Text, ColumnKind::PartitionKey)
            .with_column("cluster_name", ColumnType::Text, ColumnKind::Regular)
            .with_column("release_version", ColumnType::Text, ColumnKind::Regular),
    )
}

fn system_traces_keyspace() -> KeyspaceMetadata {
    KeyspaceMetadata::new("system_traces")
        .with_table(
            TableMetadata::new("sessions")
                .with_column("session_id", ColumnType::Uuid, ColumnKind::PartitionKey)
                .with_column("coordinator", ColumnType::Inet, ColumnKind::Regular)
                .with_column("duration", ColumnType::Int, ColumnKind::Regular),
        )
        .with_table(
            TableMetadata::new("events")
                .with_column("session_id", ColumnType::Uuid, ColumnKind::PartitionKey)
                .with_column("event_id", ColumnType::Timeuuid, ColumnKind::Clustering)
                .with_column("activity", ColumnType::Text, ColumnKind::Regular)
                .with_column("source", ColumnType::Inet, ColumnKind::Regular)
                .with_column("source_elapsed", ColumnType::Int, ColumnKind::Regular),
        )
}

impl MemoryCluster {
    /// A cluster holding only the `system` and `system_traces` keyspaces.
    pub fn new() -> Self {
        let mut state = ClusterState::default();
        for ks in [system_keyspace(), system_traces_keyspace()] {
            state.keyspaces.insert(ks.name.clone(), ks);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Add (or replace) a keyspace.
    pub fn with_keyspace(self, keyspace: KeyspaceMetadata) -> Self {
        self.state
            .lock()
            .keyspaces
            .insert(keyspace.name.clone(), keyspace);
        self
    }

    /// Expose the pre-3.0 schema layout (`system.schema_keyspaces`).
    pub fn with_legacy_schema(self) -> Self {
        {
            let mut state = self.state.lock();
            state.legacy_schema = true;
            let system = state
                .keyspaces
                .remove("system")
                .unwrap_or_else(system_keyspace)
                .with_table(
                    TableMetadata::new("schema_keyspaces")
                        .with_column("keyspace_name", ColumnType::Text, ColumnKind::PartitionKey),
                );
            state.keyspaces.insert("system".to_string(), system);
        }
        self
    }

    /// Answer statements starting with `prefix` (case-insensitive) with `result`.
    /// Later registrations win over earlier ones.
    pub fn respond(&self, prefix: &str, result: QueryResult) {
        self.state.lock().responses.push((normalize(prefix), result));
    }

    /// Fail statements starting with `prefix` with an execution error.
    pub fn fail(&self, prefix: &str, message: &str) {
        self.state
            .lock()
            .failures
            .push((normalize(prefix), message.to_string()));
    }

    /// Refuse sessions bound to `keyspace`.
    pub fn refuse_keyspace(&self, keyspace: &str) {
        self.state.lock().unreachable.insert(keyspace.to_string());
    }

    /// Refuse every new session while set.
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse_connections = refuse;
    }

    /// Trace id handed out for statements executed with tracing.
    pub fn set_trace_id(&self, id: Uuid) {
        self.state.lock().trace_id = Some(id);
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.state.lock().executed.clone()
    }

    /// Sessions currently alive.
    pub fn open_sessions(&self) -> usize {
        self.state.lock().open_sessions
    }

    /// Sessions opened over the cluster's lifetime.
    pub fn sessions_opened(&self) -> u64 {
        self.state.lock().sessions_opened
    }
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryCluster {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverSession>, Error> {
        let mut state = self.state.lock();
        if state.refuse_connections {
            return Err(Error::Connection(format!(
                "failed to connect to {}: connection refused",
                config.node_address()
            )));
        }
        if state.unreachable.contains(&config.keyspace)
            || (!config.keyspace.is_empty() && !state.keyspaces.contains_key(&config.keyspace))
        {
            return Err(Error::Connection(format!(
                "Keyspace '{}' does not exist",
                config.keyspace
            )));
        }

        state.sessions_opened += 1;
        state.open_sessions += 1;
        Ok(Box::new(MemorySession {
            id: state.sessions_opened,
            keyspace: config.keyspace.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemorySession {
    id: u64,
    keyspace: String,
    state: Arc<Mutex<ClusterState>>,
}

fn keyspace_listing(state: &ClusterState, table: &str) -> QueryResult {
    let keyspace = if table == "keyspaces" {
        "system_schema"
    } else {
        "system"
    };
    let column = ColumnSpec::new(keyspace, table, "keyspace_name", ColumnType::Text);
    let rows = state
        .keyspaces
        .keys()
        .map(|name| vec![Some(Value::Text(name.clone()))])
        .collect();
    QueryResult::new(vec![column], rows)
}

#[async_trait]
impl DriverSession for MemorySession {
    async fn execute(&self, cql: &str, tracing: bool) -> Result<QueryResult, Error> {
        let mut state = self.state.lock();
        state.executed.push(ExecutedStatement {
            session_id: self.id,
            keyspace: self.keyspace.clone(),
            cql: cql.to_string(),
            tracing,
        });

        let statement = normalize(cql);
        if let Some((_, message)) = state
            .failures
            .iter()
            .rev()
            .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
        {
            return Err(Error::execution(cql, message));
        }

        let mut result = if let Some((_, result)) = state
            .responses
            .iter()
            .rev()
            .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
        {
            result.clone()
        } else if statement == CURRENT_KEYSPACES_QUERY {
            if state.legacy_schema {
                return Err(Error::execution(cql, "unconfigured table keyspaces"));
            }
            keyspace_listing(&state, "keyspaces")
        } else if statement == LEGACY_KEYSPACES_QUERY {
            if !state.legacy_schema {
                return Err(Error::execution(cql, "unconfigured table schema_keyspaces"));
            }
            keyspace_listing(&state, "schema_keyspaces")
        } else {
            QueryResult::default()
        };

        if tracing {
            result.tracing_id = state.trace_id;
        }
        Ok(result)
    }

    async fn keyspace_metadata(&self, keyspace: &str) -> Result<Option<KeyspaceMetadata>, Error> {
        Ok(self.state.lock().keyspaces.get(keyspace).cloned())
    }

    fn keyspace(&self) -> &str {
        &self.keyspace
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.state.lock().open_sessions -= 1;
    }
}
