//! cqlshell client - sessions, schema lookups and the driver seam used by the
//! `cqlshell` binary.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use cqlshell_client::{ConnectionConfig, KeyspaceSession, ScyllaConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect to a local node, bound to the `system` keyspace
//!     let mut session =
//!         KeyspaceSession::connect(Arc::new(ScyllaConnector), ConnectionConfig::localhost())
//!             .await?;
//!
//!     // Switch keyspace
//!     session.rebind("shop").await?;
//!
//!     let result = session.execute("SELECT * FROM orders LIMIT 10").await?;
//!     println!("{} rows", result.rows.len());
//!
//!     session.close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod memory;
pub mod meta;
pub mod session;
pub mod value;

pub use config::{ConnectionConfig, Credentials};
pub use connection::ScyllaConnector;
pub use driver::{
    ColumnKind, ColumnMetadata, ColumnRole, ColumnSpec, Connector, DriverSession,
    KeyspaceMetadata, QueryResult, Row, TableMetadata,
};
pub use error::Error;
pub use memory::MemoryCluster;
pub use meta::SchemaGeneration;
pub use session::KeyspaceSession;
pub use value::{ColumnType, Value};
