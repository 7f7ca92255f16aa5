//! The shell's binding to a keyspace.
//!
//! A [`KeyspaceSession`] owns exactly one live driver session. Switching
//! keyspace opens a replacement first and only then releases the old one, so
//! a failed switch leaves the shell where it was.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::driver::{Connector, DriverSession, QueryResult};
use crate::error::Error;
use crate::meta::SchemaGeneration;

const TRACING_ALREADY_ENABLED: &str = "Tracing is already enabled. Use TRACING OFF to disable.";
const TRACING_NOT_ENABLED: &str = "Tracing is not enabled.";

/// A driver session bound to a keyspace plus the shell state that travels
/// with it.
pub struct KeyspaceSession {
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    handle: Box<dyn DriverSession>,
    tracing: bool,
    schema: OnceCell<SchemaGeneration>,
}

impl KeyspaceSession {
    /// Open a session bound to `config.keyspace`.
    pub async fn connect(
        connector: Arc<dyn Connector>,
        config: ConnectionConfig,
    ) -> Result<Self, Error> {
        let handle = connector.connect(&config).await?;
        info!(
            host = %config.host,
            port = config.port,
            keyspace = %config.keyspace,
            "session opened"
        );
        Ok(Self {
            connector,
            config,
            handle,
            tracing: false,
            schema: OnceCell::new(),
        })
    }

    /// Coordinates of the live session.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Keyspace the live session is bound to.
    pub fn active_keyspace(&self) -> &str {
        &self.config.keyspace
    }

    /// The live driver session.
    pub fn driver(&self) -> &dyn DriverSession {
        self.handle.as_ref()
    }

    pub(crate) fn schema_cache(&self) -> &OnceCell<SchemaGeneration> {
        &self.schema
    }

    /// Execute a statement without tracing.
    pub async fn execute(&self, cql: &str) -> Result<QueryResult, Error> {
        self.handle.execute(cql, false).await
    }

    /// Execute a statement asking the coordinator to record a trace.
    pub async fn execute_traced(&self, cql: &str) -> Result<QueryResult, Error> {
        self.handle.execute(cql, true).await
    }

    /// Switch to `keyspace`.
    ///
    /// The replacement session is opened before the current one is released.
    /// On failure the current session, keyspace and cached schema generation
    /// are untouched and the driver's error is returned.
    pub async fn rebind(&mut self, keyspace: &str) -> Result<(), Error> {
        let target = self.config.clone().with_keyspace(keyspace);
        let handle = match self.connector.connect(&target).await {
            Ok(handle) => handle,
            Err(e) => {
                debug!(keyspace, error = %e, "keyspace switch failed");
                return Err(e);
            }
        };

        let previous = std::mem::replace(&mut self.handle, handle);
        let from = std::mem::replace(&mut self.config, target).keyspace;
        self.schema = OnceCell::new();
        drop(previous);

        info!(from = %from, to = %self.config.keyspace, "keyspace switched");
        Ok(())
    }

    /// Open an independent session with the same coordinates and keyspace.
    /// The clone starts with tracing disabled.
    pub async fn clone_session(&self) -> Result<KeyspaceSession, Error> {
        let session = Self::connect(Arc::clone(&self.connector), self.config.clone()).await?;
        debug!(keyspace = %self.config.keyspace, "session cloned");
        Ok(session)
    }

    pub fn tracing_enabled(&self) -> bool {
        self.tracing
    }

    pub fn enable_tracing(&mut self) -> Result<(), Error> {
        if self.tracing {
            return Err(Error::TracingState(TRACING_ALREADY_ENABLED.to_string()));
        }
        self.tracing = true;
        debug!("tracing enabled");
        Ok(())
    }

    pub fn disable_tracing(&mut self) -> Result<(), Error> {
        if !self.tracing {
            return Err(Error::TracingState(TRACING_NOT_ENABLED.to_string()));
        }
        self.tracing = false;
        debug!("tracing disabled");
        Ok(())
    }

    /// Release the live session.
    pub fn close(self) {
        debug!(keyspace = %self.config.keyspace, "session closed");
    }
}
