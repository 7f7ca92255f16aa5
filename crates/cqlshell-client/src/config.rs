//! Connection configuration.

use std::time::Duration;

/// Default contact point.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default CQL native protocol port.
pub const DEFAULT_PORT: u16 = 9042;

/// Keyspace a new shell is bound to when none is given.
pub const DEFAULT_KEYSPACE: &str = "system";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Username/password pair for password authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Coordinates of a driver session: where to connect, as whom, and which
/// keyspace the session is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Contact point host name or address.
    pub host: String,

    /// Native protocol port.
    pub port: u16,

    /// Optional password authentication.
    pub credentials: Option<Credentials>,

    /// Keyspace the session is bound to.
    pub keyspace: String,

    /// Request timeout applied to every statement.
    pub timeout: Duration,
}

impl ConnectionConfig {
    /// Create a configuration for the given contact point.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
            keyspace: DEFAULT_KEYSPACE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a configuration for a node on localhost.
    pub fn localhost() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }

    /// Authenticate with a username and password.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Bind to a different keyspace.
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = keyspace.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port` form used as the driver's known node.
    pub fn node_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            // bare IPv6 literal
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::localhost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.keyspace, DEFAULT_KEYSPACE);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ConnectionConfig::new("10.0.0.7", 19042)
            .with_credentials("cassandra", "secret")
            .with_keyspace("shop")
            .with_timeout(Duration::from_secs(3));

        assert_eq!(config.node_address(), "10.0.0.7:19042");
        assert_eq!(config.keyspace, "shop");
        assert_eq!(config.timeout, Duration::from_secs(3));
        let creds = config.credentials.as_ref().unwrap();
        assert_eq!(creds.username, "cassandra");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn test_ipv6_node_address() {
        let config = ConnectionConfig::new("::1", 9042);
        assert_eq!(config.node_address(), "[::1]:9042");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let config = ConnectionConfig::localhost().with_credentials("admin", "hunter2");
        let debug = format!("{:?}", config);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
