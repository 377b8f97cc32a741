use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;
use serde::Deserialize;

use crate::connection::Connection;
use crate::error::SessionError;
use crate::transport::QueryExecutor;

/// Wire protocol the transport speaks to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Grpc,
    Tcp,
}

impl Protocol {
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => 8123,
            Protocol::Grpc => 9100,
            Protocol::Tcp => 9000,
        }
    }
}

/// The server a session talks to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Node {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Protocol,
}

impl Node {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            protocol: Protocol::default(),
        }
    }

    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.protocol {
            Protocol::Http => "http",
            Protocol::Grpc => "grpc",
            Protocol::Tcp => "tcp",
        };
        write!(f, "{scheme}://{}:{}", self.host, self.effective_port())
    }
}

fn default_true() -> bool {
    true
}

fn default_user() -> String {
    "default".to_string()
}

fn default_database() -> String {
    "default".to_string()
}

/// Parsed connection descriptor.
///
/// Deserializable so it can be loaded from a JSON config file:
/// ```rust
/// use clickhouse_session::prelude::*;
///
/// let opts: ConnectionOptions = serde_json::from_str(
///     r#"{ "node": { "host": "localhost" }, "compliant": false }"#,
/// ).unwrap();
/// assert!(!opts.compliant);
/// assert_eq!(opts.database, "default");
/// ```
#[derive(Clone, Deserialize)]
pub struct ConnectionOptions {
    pub node: Node,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Compliance mode: unsupported transaction features degrade to logged no-ops
    /// instead of failing.
    #[serde(default = "default_true")]
    pub compliant: bool,
    /// Pre-negotiated server timezone; together with `server_version` it skips the
    /// bootstrap round trip.
    #[serde(default)]
    pub server_time_zone: Option<String>,
    #[serde(default)]
    pub server_version: Option<String>,
    #[serde(default = "default_true")]
    pub use_server_time_zone: bool,
    /// Client timezone used when `use_server_time_zone` is off.
    #[serde(default)]
    pub use_time_zone: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default = "default_true")]
    pub compress: bool,
}

// Manual Debug implementation to keep the password out of logs
impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("node", &self.node)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("compliant", &self.compliant)
            .field("server_time_zone", &self.server_time_zone)
            .field("server_version", &self.server_version)
            .field("use_server_time_zone", &self.use_server_time_zone)
            .field("use_time_zone", &self.use_time_zone)
            .field("client_name", &self.client_name)
            .field("compress", &self.compress)
            .finish()
    }
}

impl ConnectionOptions {
    #[must_use]
    pub fn new(node: Node) -> Self {
        Self {
            node,
            database: default_database(),
            user: default_user(),
            password: None,
            compliant: true,
            server_time_zone: None,
            server_version: None,
            use_server_time_zone: true,
            use_time_zone: None,
            client_name: None,
            compress: true,
        }
    }

    /// Whether both server facts were supplied out of band.
    #[must_use]
    pub fn has_server_info(&self) -> bool {
        self.server_time_zone.is_some() && self.server_version.is_some()
    }

    /// Check required fields before any network traffic.
    ///
    /// # Errors
    /// Returns `SessionError::Config` if the host is empty or no client timezone can be
    /// derived.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.node.host.trim().is_empty() {
            return Err(SessionError::Config("host is required".to_string()));
        }
        if !self.use_server_time_zone
            && self.use_time_zone.as_deref().is_none_or(|tz| tz.trim().is_empty())
        {
            return Err(SessionError::Config(
                "use_time_zone is required when use_server_time_zone is disabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for connection options.
#[derive(Debug, Clone)]
pub struct ConnectionOptionsBuilder {
    opts: ConnectionOptions,
}

impl ConnectionOptionsBuilder {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            opts: ConnectionOptions::new(Node::new(host)),
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.node.port = Some(port);
        self
    }

    #[must_use]
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.opts.node.protocol = protocol;
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.opts.database = database.into();
        self
    }

    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.opts.user = user.into();
        self.opts.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn compliant(mut self, compliant: bool) -> Self {
        self.opts.compliant = compliant;
        self
    }

    /// Supply server facts up front so connecting does not probe the server.
    #[must_use]
    pub fn server_info(
        mut self,
        time_zone: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.opts.server_time_zone = Some(time_zone.into());
        self.opts.server_version = Some(version.into());
        self
    }

    /// Use an explicit client timezone instead of the server's.
    #[must_use]
    pub fn client_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.opts.use_server_time_zone = false;
        self.opts.use_time_zone = Some(time_zone.into());
        self
    }

    #[must_use]
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.opts.client_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn compress(mut self, compress: bool) -> Self {
        self.opts.compress = compress;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionOptions {
        self.opts
    }

    /// Open a session over the given transport.
    ///
    /// # Errors
    /// See [`Connection::connect`].
    pub async fn connect(
        self,
        executor: Arc<dyn QueryExecutor>,
    ) -> Result<Connection, SessionError> {
        Connection::connect(executor, self.finish()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_client_time_zone() {
        let opts = ConnectionOptionsBuilder::new("ch1")
            .port(18123)
            .client_time_zone("Asia/Tokyo")
            .finish();
        assert!(!opts.use_server_time_zone);
        assert_eq!(opts.use_time_zone.as_deref(), Some("Asia/Tokyo"));
        assert_eq!(opts.node.to_string(), "http://ch1:18123");
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_host() {
        let opts = ConnectionOptions::new(Node::new("  "));
        assert!(matches!(opts.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn validate_requires_client_zone_when_not_using_server_zone() {
        let mut opts = ConnectionOptions::new(Node::new("localhost"));
        opts.use_server_time_zone = false;
        assert!(matches!(opts.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn debug_redacts_password() {
        let opts = ConnectionOptionsBuilder::new("localhost")
            .credentials("bob", "hunter2")
            .finish();
        let rendered = format!("{opts:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn server_info_needs_both_facts() {
        let mut opts = ConnectionOptions::new(Node::new("localhost"));
        opts.server_time_zone = Some("UTC".into());
        assert!(!opts.has_server_info());
        opts.server_version = Some("23.3".into());
        assert!(opts.has_server_info());
    }
}
